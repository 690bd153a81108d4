//! Locator abstraction for describing document queries.
//!
//! A [`Locator`] is pure data: a query strategy plus a value, optionally
//! chained relative to a parent locator or anchored at an already-resolved
//! node. Composition never touches the document; resolution is delegated to
//! the [`Driver`](crate::driver::Driver) boundary.
//!
//! # Design
//!
//! - **Immutable**: every combinator consumes and returns a new value
//! - **Structural equality**: two locators are equal iff their whole
//!   strategy/value/parent chains are equal, enabling deduplication in tests
//! - **Scoped chains**: once a parent is set, the effective query is
//!   evaluated relative to the parent's first matched node, never the
//!   document root

use serde::{Deserialize, Serialize};

use crate::driver::{Driver, NodeHandle};
use crate::result::ArmarResult;

/// Query strategy for locating nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// CSS selector (e.g. `button.primary`)
    Css,
    /// XPath expression
    XPath,
    /// Element id attribute
    Id,
}

impl Strategy {
    /// Short name used when rendering a locator chain
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Id => "id",
        }
    }
}

/// A composable query descriptor identifying document node(s).
///
/// # Example
///
/// ```
/// use armar::Locator;
///
/// let grid = Locator::css("table.grid");
/// let pager = Locator::css(".pager").within(&grid);
/// assert_eq!(pager.parent(), Some(&grid));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    strategy: Strategy,
    value: String,
    /// Chained form: query is scoped to the parent's first match
    parent: Option<Box<Locator>>,
    /// Relative-to-node form: query is scoped under a live node handle
    anchor: Option<String>,
}

impl Locator {
    /// Create a CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// Create an XPath locator
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, expression)
    }

    /// Create an id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Strategy::Id, id)
    }

    fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            parent: None,
            anchor: None,
        }
    }

    /// Scope this locator to the results of `parent`.
    ///
    /// The returned locator's query is evaluated relative to the parent's
    /// first matched node.
    #[must_use]
    pub fn within(mut self, parent: &Self) -> Self {
        self.parent = Some(Box::new(parent.clone()));
        self
    }

    /// Combine a parent and a child locator into a chained locator.
    ///
    /// Equivalent to `child.within(parent)`.
    #[must_use]
    pub fn combine(parent: &Self, child: &Self) -> Self {
        child.clone().within(parent)
    }

    /// Anchor this locator at an already-resolved node.
    ///
    /// The query is evaluated inside the node's subtree. An anchor takes
    /// precedence over a parent chain during resolution.
    #[must_use]
    pub fn anchored(mut self, node: &NodeHandle) -> Self {
        self.anchor = Some(node.id.clone());
        self
    }

    /// The query strategy
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The query value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The parent locator, if this is a chained locator
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.parent.as_deref()
    }

    /// The node id this locator is anchored at, if any
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Depth of the parent chain (0 for an unchained locator)
    #[must_use]
    pub fn chain_depth(&self) -> usize {
        match &self.parent {
            Some(parent) => 1 + parent.chain_depth(),
            None => 0,
        }
    }

    /// Render the full chain for error messages, root first.
    ///
    /// A chained locator renders as `css:table.grid >> css:.pager`.
    #[must_use]
    pub fn selector(&self) -> String {
        let own = format!("{}:{}", self.strategy.name(), self.value);
        match &self.parent {
            Some(parent) => format!("{} >> {}", parent.selector(), own),
            None => own,
        }
    }

    /// Resolve this locator to its first matching node.
    ///
    /// # Errors
    ///
    /// Returns [`ArmarError::NodeNotFound`](crate::ArmarError::NodeNotFound)
    /// when nothing matches, or any driver error unmodified.
    pub fn resolve(&self, driver: &dyn Driver) -> ArmarResult<NodeHandle> {
        driver.find_node(self)
    }

    /// Resolve this locator to every matching node.
    pub fn resolve_all(&self, driver: &dyn Driver) -> ArmarResult<Vec<NodeHandle>> {
        driver.find_nodes(self)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.selector())
    }
}
