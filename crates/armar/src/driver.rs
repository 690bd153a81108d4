//! Driver boundary - the external browser session consumed by Armar.
//!
//! The core never talks to a browser directly. Everything document-shaped
//! goes through the [`Driver`] trait: locator resolution, navigation, and
//! the capability calls for a single node (attribute/property/style reads,
//! click/type/submit actions). Implementations wrap a real automation
//! session; [`MockDriver`] backs hermetic tests with an in-memory document.
//!
//! All calls are synchronous and fallible. "No matching node"
//! ([`ArmarError::NodeNotFound`]) is distinguishable from "driver
//! unavailable" ([`ArmarError::DriverUnavailable`]); everything else the
//! session reports passes through unmodified.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::locator::{Locator, Strategy};
use crate::result::{ArmarError, ArmarResult};

/// Handle for one live document element.
///
/// A handle is plain data; actions and reads against the element go through
/// the [`Driver`] that minted it. Handles become stale once the underlying
/// document navigates away - detecting that is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHandle {
    /// Driver-assigned handle identity
    pub id: String,
    /// Element tag name, lowercase
    pub tag_name: String,
    /// Classes present on the element
    pub classes: Vec<String>,
    /// Direct text content, if any
    pub text_content: Option<String>,
}

impl NodeHandle {
    /// Check whether the element carries a class
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Abstract browser session consumed by the assembler and by page objects.
///
/// One session must be driven from a single logical thread of control;
/// implementations are `Send + Sync` so a session can be shared across the
/// components of one object graph, not so calls may overlap.
pub trait Driver: Send + Sync {
    /// Resolve a locator to its first matching node.
    ///
    /// Chained locators are evaluated relative to the parent's first match;
    /// anchored locators are evaluated inside the anchor node's subtree.
    fn find_node(&self, locator: &Locator) -> ArmarResult<NodeHandle>;

    /// Resolve a locator to every matching node, in document order.
    fn find_nodes(&self, locator: &Locator) -> ArmarResult<Vec<NodeHandle>>;

    /// Navigate the session to a URL.
    fn navigate(&self, url: &str) -> ArmarResult<()>;

    /// The URL the session is currently at.
    fn current_url(&self) -> ArmarResult<String>;

    /// Read an attribute from a node.
    fn attribute(&self, node: &NodeHandle, name: &str) -> ArmarResult<Option<String>>;

    /// Read a live property from a node.
    fn property(&self, node: &NodeHandle, name: &str) -> ArmarResult<serde_json::Value>;

    /// Read a computed style value from a node.
    fn style(&self, node: &NodeHandle, name: &str) -> ArmarResult<Option<String>>;

    /// Click a node.
    fn click(&self, node: &NodeHandle) -> ArmarResult<()>;

    /// Type text into a node.
    fn type_text(&self, node: &NodeHandle, text: &str) -> ArmarResult<()>;

    /// Submit the form a node belongs to.
    fn submit(&self, node: &NodeHandle) -> ArmarResult<()>;
}

// ============================================================================
// Mock driver and document fixture
// ============================================================================

/// Declarative node for building [`MockDriver`] document fixtures.
///
/// # Example
///
/// ```
/// use armar::MockNode;
///
/// let grid = MockNode::new("table")
///     .with_class("grid")
///     .with_child(MockNode::new("nav").with_class("pager"));
/// ```
#[derive(Debug, Clone)]
pub struct MockNode {
    tag: String,
    id_attr: Option<String>,
    classes: Vec<String>,
    attributes: HashMap<String, String>,
    text: Option<String>,
    children: Vec<MockNode>,
}

impl MockNode {
    /// Create a node with a tag name
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            id_attr: None,
            classes: Vec::new(),
            attributes: HashMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Set the element id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id_attr = Some(id.into());
        self
    }

    /// Add a class
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set direct text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child node
    #[must_use]
    pub fn with_child(mut self, child: MockNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    handle: String,
    tag: String,
    id_attr: Option<String>,
    classes: Vec<String>,
    attributes: HashMap<String, String>,
    text: Option<String>,
    children: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
struct Document {
    nodes: Vec<StoredNode>,
    root: Option<usize>,
    by_handle: HashMap<String, usize>,
}

impl Document {
    fn build(root: MockNode) -> Self {
        let mut doc = Self::default();
        let idx = doc.insert(root);
        doc.root = Some(idx);
        doc
    }

    fn insert(&mut self, node: MockNode) -> usize {
        let handle = uuid::Uuid::new_v4().to_string();
        let children: Vec<usize> = node
            .children
            .into_iter()
            .map(|child| self.insert(child))
            .collect();
        let idx = self.nodes.len();
        self.nodes.push(StoredNode {
            handle: handle.clone(),
            tag: node.tag,
            id_attr: node.id_attr,
            classes: node.classes,
            attributes: node.attributes,
            text: node.text,
            children,
        });
        let _ = self.by_handle.insert(handle, idx);
        idx
    }

    /// Indices of the subtree below `root`, document order, excluding `root`.
    fn descendants(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[root].children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.nodes[idx].children.iter().rev().copied());
        }
        out
    }

    fn handle_of(&self, idx: usize) -> NodeHandle {
        let node = &self.nodes[idx];
        NodeHandle {
            id: node.handle.clone(),
            tag_name: node.tag.clone(),
            classes: node.classes.clone(),
            text_content: node.text.clone(),
        }
    }
}

/// One compound simple selector: `tag.class1.class2#id` in any order.
#[derive(Debug, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl SimpleSelector {
    fn parse(value: &str) -> Self {
        let mut sel = Self::default();
        let mut rest = value.trim();
        // leading tag name, if any
        let tag_end = rest
            .find(|c| c == '.' || c == '#')
            .unwrap_or(rest.len());
        if tag_end > 0 {
            sel.tag = Some(rest[..tag_end].to_ascii_lowercase());
        }
        rest = &rest[tag_end..];
        while !rest.is_empty() {
            let marker = rest.as_bytes()[0];
            let body = &rest[1..];
            let end = body
                .find(|c| c == '.' || c == '#')
                .unwrap_or(body.len());
            let token = &body[..end];
            match marker {
                b'.' => sel.classes.push(token.to_string()),
                b'#' => sel.id = Some(token.to_string()),
                _ => {}
            }
            rest = &body[end..];
        }
        sel
    }

    fn matches(&self, node: &StoredNode) -> bool {
        if let Some(tag) = &self.tag {
            if node.tag != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.id_attr.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|class| node.classes.iter().any(|c| c == class))
    }
}

#[derive(Debug, Default)]
struct MockState {
    pages: HashMap<String, Document>,
    current: Document,
    current_url: Option<String>,
    history: Vec<String>,
    unavailable: bool,
}

/// In-memory driver for hermetic tests.
///
/// Holds declarative document fixtures ([`MockNode`] trees), resolves CSS
/// compound selectors (`tag`, `.class`, `#id` and combinations), element
/// ids, and the trivial `//tag` XPath form. Descendant scoping is expressed
/// through locator chaining rather than selector combinators. Records a
/// call history for verification.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Create an empty mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a document fixture reachable by navigation to `url`
    pub fn install_page(&self, url: impl Into<String>, root: MockNode) {
        let mut state = self.lock();
        let _ = state.pages.insert(url.into(), Document::build(root));
    }

    /// Install a document fixture as the current document, no navigation
    pub fn install_document(&self, root: MockNode) {
        let mut state = self.lock();
        state.current = Document::build(root);
    }

    /// Make every subsequent call fail with `DriverUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Recorded call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check whether a call with the given prefix was recorded
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(prefix))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn guard(state: &MockState) -> ArmarResult<()> {
        if state.unavailable {
            return Err(ArmarError::DriverUnavailable {
                message: "mock session closed".to_string(),
            });
        }
        Ok(())
    }

    fn matches(node: &StoredNode, strategy: Strategy, value: &str) -> bool {
        match strategy {
            Strategy::Css => SimpleSelector::parse(value).matches(node),
            Strategy::Id => node.id_attr.as_deref() == Some(value),
            // The mock understands only the `//tag` form.
            Strategy::XPath => value
                .strip_prefix("//")
                .is_some_and(|tag| node.tag == tag.to_ascii_lowercase()),
        }
    }

    /// Resolve a locator to matching node indices within the current document.
    fn resolve(state: &MockState, locator: &Locator) -> ArmarResult<Vec<usize>> {
        let doc = &state.current;
        let candidates: Vec<usize> = if let Some(anchor) = locator.anchor() {
            let root = *doc.by_handle.get(anchor).ok_or_else(|| {
                // Anchor is gone: the handle went stale with the document.
                ArmarError::NodeNotFound {
                    selector: locator.selector(),
                }
            })?;
            doc.descendants(root)
        } else if let Some(parent) = locator.parent() {
            let parent_matches = Self::resolve(state, parent)?;
            let first = *parent_matches.first().ok_or_else(|| ArmarError::NodeNotFound {
                selector: parent.selector(),
            })?;
            doc.descendants(first)
        } else {
            match doc.root {
                Some(root) => {
                    let mut all = vec![root];
                    all.extend(doc.descendants(root));
                    all
                }
                None => Vec::new(),
            }
        };

        Ok(candidates
            .into_iter()
            .filter(|&idx| Self::matches(&doc.nodes[idx], locator.strategy(), locator.value()))
            .collect())
    }

    fn node_index(state: &MockState, node: &NodeHandle) -> ArmarResult<usize> {
        state
            .current
            .by_handle
            .get(&node.id)
            .copied()
            .ok_or_else(|| ArmarError::NodeNotFound {
                selector: format!("handle:{}", node.id),
            })
    }
}

impl Driver for MockDriver {
    fn find_node(&self, locator: &Locator) -> ArmarResult<NodeHandle> {
        let state = self.lock();
        Self::guard(&state)?;
        let matches = Self::resolve(&state, locator)?;
        matches
            .first()
            .map(|&idx| state.current.handle_of(idx))
            .ok_or_else(|| ArmarError::NodeNotFound {
                selector: locator.selector(),
            })
    }

    fn find_nodes(&self, locator: &Locator) -> ArmarResult<Vec<NodeHandle>> {
        let state = self.lock();
        Self::guard(&state)?;
        let matches = Self::resolve(&state, locator)?;
        Ok(matches
            .into_iter()
            .map(|idx| state.current.handle_of(idx))
            .collect())
    }

    fn navigate(&self, url: &str) -> ArmarResult<()> {
        let mut state = self.lock();
        Self::guard(&state)?;
        state.history.push(format!("navigate:{url}"));
        let document = state
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| ArmarError::Navigation {
                url: url.to_string(),
                message: "no document installed at this URL".to_string(),
            })?;
        state.current = document;
        state.current_url = Some(url.to_string());
        Ok(())
    }

    fn current_url(&self) -> ArmarResult<String> {
        let state = self.lock();
        Self::guard(&state)?;
        Ok(state.current_url.clone().unwrap_or_default())
    }

    fn attribute(&self, node: &NodeHandle, name: &str) -> ArmarResult<Option<String>> {
        let state = self.lock();
        Self::guard(&state)?;
        let idx = Self::node_index(&state, node)?;
        let stored = &state.current.nodes[idx];
        if name == "id" {
            return Ok(stored.id_attr.clone());
        }
        if name == "class" {
            return Ok(Some(stored.classes.join(" ")));
        }
        Ok(stored.attributes.get(name).cloned())
    }

    fn property(&self, node: &NodeHandle, name: &str) -> ArmarResult<serde_json::Value> {
        let state = self.lock();
        Self::guard(&state)?;
        let idx = Self::node_index(&state, node)?;
        let stored = &state.current.nodes[idx];
        let value = match name {
            "tagName" => serde_json::Value::String(stored.tag.to_ascii_uppercase()),
            "textContent" => stored
                .text
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
            other => stored
                .attributes
                .get(other)
                .cloned()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
        };
        Ok(value)
    }

    fn style(&self, node: &NodeHandle, name: &str) -> ArmarResult<Option<String>> {
        let state = self.lock();
        Self::guard(&state)?;
        let idx = Self::node_index(&state, node)?;
        let stored = &state.current.nodes[idx];
        let style = stored.attributes.get("style").cloned().unwrap_or_default();
        Ok(style.split(';').find_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            (prop.trim() == name).then(|| value.trim().to_string())
        }))
    }

    fn click(&self, node: &NodeHandle) -> ArmarResult<()> {
        let mut state = self.lock();
        Self::guard(&state)?;
        let _ = Self::node_index(&state, node)?;
        state.history.push(format!("click:{}", node.tag_name));
        Ok(())
    }

    fn type_text(&self, node: &NodeHandle, text: &str) -> ArmarResult<()> {
        let mut state = self.lock();
        Self::guard(&state)?;
        let _ = Self::node_index(&state, node)?;
        state
            .history
            .push(format!("type:{}:{}", node.tag_name, text));
        Ok(())
    }

    fn submit(&self, node: &NodeHandle) -> ArmarResult<()> {
        let mut state = self.lock();
        Self::guard(&state)?;
        let _ = Self::node_index(&state, node)?;
        state.history.push(format!("submit:{}", node.tag_name));
        Ok(())
    }
}
