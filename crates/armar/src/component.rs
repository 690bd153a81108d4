//! Component binding: locator resolution plus structural validation.
//!
//! A component is bound to a node subtree located by a [`Locator`],
//! optionally scoped under a parent component. Concrete components embed an
//! [`Arc<ComponentCore>`](ComponentCore) and delegate their
//! [`Loadable`](crate::Loadable) implementation to it; extension points are
//! injected validation callbacks, not inheritance.
//!
//! The parent back-reference is a `Weak` handle used strictly for locator
//! scoping - a child never owns its parent and never drives its lifetime.

use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::driver::{Driver, NodeHandle};
use crate::lifecycle::{LoadState, StateCell};
use crate::locator::Locator;
use crate::result::{ArmarError, ArmarResult};

/// Injected structural check run against the freshly resolved node.
pub type NodeValidator = Box<dyn Fn(&NodeHandle, &dyn Driver) -> ArmarResult<()> + Send + Sync>;

/// Locator-resolution and validation plumbing shared by concrete components.
///
/// `bind` resolves the component's locator - against the parent's bound
/// node when a parent is set, otherwise against the document root - and
/// checks the result against the expected shape (tag, marker class, and any
/// injected validators) before the node handle becomes visible.
pub struct ComponentCore {
    driver: Arc<dyn Driver>,
    locator: Locator,
    parent: Option<Weak<ComponentCore>>,
    expected_tag: Option<String>,
    marker_class: Option<String>,
    validators: Vec<NodeValidator>,
    node: Mutex<Option<NodeHandle>>,
    state: StateCell,
    name: String,
}

impl std::fmt::Debug for ComponentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCore")
            .field("name", &self.name)
            .field("locator", &self.locator)
            .field("state", &self.state.get())
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl ComponentCore {
    /// Create a component core resolving `locator` against the document root
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, locator: Locator) -> Self {
        Self {
            driver,
            locator,
            parent: None,
            expected_tag: None,
            marker_class: None,
            validators: Vec::new(),
            node: Mutex::new(None),
            state: StateCell::new(),
            name: "component".to_string(),
        }
    }

    /// Name used in logs and error context (defaults to `"component"`)
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Scope resolution under a parent component's bound node
    #[must_use]
    pub fn child_of(self, parent: &Arc<ComponentCore>) -> Self {
        self.child_of_weak(Arc::downgrade(parent))
    }

    /// Scope resolution under a parent held as a `Weak` handle
    #[must_use]
    pub fn child_of_weak(mut self, parent: Weak<ComponentCore>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Require the bound node to carry this tag name
    #[must_use]
    pub fn expect_tag(mut self, tag: impl Into<String>) -> Self {
        self.expected_tag = Some(tag.into().to_ascii_lowercase());
        self
    }

    /// Require the bound node to carry this marker class
    #[must_use]
    pub fn expect_marker_class(mut self, class: impl Into<String>) -> Self {
        self.marker_class = Some(class.into());
        self
    }

    /// Inject an additional structural check
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&NodeHandle, &dyn Driver) -> ArmarResult<()> + Send + Sync + 'static,
    {
        self.validators.push(Box::new(validator));
        self
    }

    /// The shared driver session
    #[must_use]
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// The component's locator
    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state.get()
    }

    /// The bound node handle.
    ///
    /// # Errors
    ///
    /// [`ArmarError::InvalidState`] unless the component is `Loaded` - the
    /// handle is undefined before `bind` succeeds.
    pub fn node(&self) -> ArmarResult<NodeHandle> {
        if !self.state.get().is_usable() {
            return Err(ArmarError::InvalidState {
                message: format!(
                    "{}: bound node accessed in state '{}' (load first)",
                    self.name,
                    self.state.get()
                ),
            });
        }
        let guard = match self.node.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().ok_or_else(|| ArmarError::InvalidState {
            message: format!("{}: loaded without a bound node", self.name),
        })
    }

    /// Resolve, validate, and bind, driving the lifecycle state machine.
    ///
    /// # Errors
    ///
    /// [`ArmarError::StructuralValidation`] when nothing matches the locator
    /// or the node has the wrong shape; driver errors pass through with the
    /// component name attached. Either way the state becomes `Failed`.
    pub fn bind(&self) -> ArmarResult<()> {
        self.state.advance(LoadState::Loading);
        match self.try_bind() {
            Ok(node) => {
                debug!(
                    component = self.name.as_str(),
                    selector = self.locator.selector().as_str(),
                    tag = node.tag_name.as_str(),
                    "component bound"
                );
                let mut guard = match self.node.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *guard = Some(node);
                drop(guard);
                self.state.advance(LoadState::Loaded);
                Ok(())
            }
            Err(err) => {
                self.state.advance(LoadState::Failed);
                Err(err.in_component(self.name.clone()))
            }
        }
    }

    /// Bind, then run `children` to assemble nested components.
    ///
    /// The closure receives the freshly bound node so children can be
    /// prepared under it. A failure in `children` moves this component to
    /// `Failed` so a half-built subtree is never observed as usable.
    pub fn bind_with<F>(&self, children: F) -> ArmarResult<()>
    where
        F: FnOnce(&NodeHandle) -> ArmarResult<()>,
    {
        self.bind()?;
        let node = self.node()?;
        if let Err(err) = children(&node) {
            self.state.advance(LoadState::Failed);
            return Err(err);
        }
        Ok(())
    }

    fn try_bind(&self) -> ArmarResult<NodeHandle> {
        let effective = self.effective_locator()?;
        let node = match self.driver.find_node(&effective) {
            Ok(node) => node,
            Err(ArmarError::NodeNotFound { .. }) => {
                return Err(self.structural_error(&effective, "no matching node"));
            }
            Err(other) => return Err(other),
        };

        if let Some(tag) = &self.expected_tag {
            if node.tag_name != *tag {
                return Err(self.structural_error(
                    &effective,
                    format!("expected tag '{}', found '{}'", tag, node.tag_name),
                ));
            }
        }
        if let Some(class) = &self.marker_class {
            if !node.has_class(class) {
                return Err(
                    self.structural_error(&effective, format!("missing marker class '{class}'"))
                );
            }
        }
        for validator in &self.validators {
            validator(&node, self.driver.as_ref())
                .map_err(|err| err.in_component(self.name.clone()))?;
        }
        Ok(node)
    }

    /// The locator actually sent to the driver: anchored at the parent's
    /// bound node once a parent is set, never the document root.
    fn effective_locator(&self) -> ArmarResult<Locator> {
        match &self.parent {
            Some(weak) => {
                let parent = weak.upgrade().ok_or_else(|| ArmarError::InvalidState {
                    message: format!("{}: parent component dropped before load", self.name),
                })?;
                let parent_node = parent.node().map_err(|_| ArmarError::InvalidState {
                    message: format!(
                        "{}: parent '{}' is not loaded; load parents before children",
                        self.name, parent.name
                    ),
                })?;
                Ok(self.locator.clone().anchored(&parent_node))
            }
            None => Ok(self.locator.clone()),
        }
    }

    fn structural_error(&self, locator: &Locator, message: impl Into<String>) -> ArmarError {
        ArmarError::StructuralValidation {
            component: self.name.clone(),
            selector: locator.selector(),
            message: message.into(),
        }
    }

    // ------------------------------------------------------------------
    // Capability conveniences over the bound node
    // ------------------------------------------------------------------

    /// Read an attribute from the bound node
    pub fn attribute(&self, name: &str) -> ArmarResult<Option<String>> {
        self.driver.attribute(&self.node()?, name)
    }

    /// Read a live property from the bound node
    pub fn property(&self, name: &str) -> ArmarResult<serde_json::Value> {
        self.driver.property(&self.node()?, name)
    }

    /// Read a computed style value from the bound node
    pub fn style(&self, name: &str) -> ArmarResult<Option<String>> {
        self.driver.style(&self.node()?, name)
    }

    /// Click the bound node
    pub fn click(&self) -> ArmarResult<()> {
        self.driver.click(&self.node()?)
    }

    /// Type text into the bound node
    pub fn type_text(&self, text: &str) -> ArmarResult<()> {
        self.driver.type_text(&self.node()?, text)
    }

    /// Submit the form the bound node belongs to
    pub fn submit(&self) -> ArmarResult<()> {
        self.driver.submit(&self.node()?)
    }

    /// Resolve a child locator inside the bound node's subtree
    pub fn find(&self, locator: &Locator) -> ArmarResult<NodeHandle> {
        let anchored = locator.clone().anchored(&self.node()?);
        self.driver.find_node(&anchored)
    }

    /// Resolve every match of a child locator inside the bound node's subtree
    pub fn find_all(&self, locator: &Locator) -> ArmarResult<Vec<NodeHandle>> {
        let anchored = locator.clone().anchored(&self.node()?);
        self.driver.find_nodes(&anchored)
    }
}
