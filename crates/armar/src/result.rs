//! Result and error types for Armar.

use thiserror::Error;

/// Result type for Armar operations
pub type ArmarResult<T> = Result<T, ArmarError>;

/// Errors that can occur in Armar
#[derive(Debug, Error)]
pub enum ArmarError {
    /// Requested contract has no binding in the registry
    #[error("no binding registered for contract '{contract}'")]
    UnresolvedDependency {
        /// Fully qualified contract type name
        contract: String,
    },

    /// Provider dependency graph contains a cycle
    #[error("dependency cycle detected: {chain}")]
    DependencyCycle {
        /// Resolution chain, root first, ending at the repeated contract
        chain: String,
    },

    /// A module's own registration step failed; discovery aborts entirely
    #[error("module '{module}' failed to register: {message}")]
    ModuleRegistration {
        /// Name of the offending module
        module: String,
        /// Error message
        message: String,
    },

    /// A component's load found no node, or a node of the wrong shape
    #[error("structural validation failed for {component} at '{selector}': {message}")]
    StructuralValidation {
        /// Component type name
        component: String,
        /// Rendered locator chain
        selector: String,
        /// What did not match
        message: String,
    },

    /// A page failed to reach or confirm its target document
    #[error("navigation to '{url}' failed: {message}")]
    Navigation {
        /// Target URL or pattern
        url: String,
        /// Error message
        message: String,
    },

    /// A provider closure misbehaved (wrong type, missing scope)
    #[error("provider for '{contract}' failed: {message}")]
    Provider {
        /// Contract type name being resolved
        contract: String,
        /// Error message
        message: String,
    },

    /// A locator matched no node in the live document
    #[error("no node matched '{selector}'")]
    NodeNotFound {
        /// Rendered locator chain
        selector: String,
    },

    /// The driver session is gone or cannot service calls
    #[error("driver unavailable: {message}")]
    DriverUnavailable {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Operation called in the wrong lifecycle state
    #[error("invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Driver-originated error wrapped with the component that hit it
    #[error("{component}: {source}")]
    Context {
        /// Component type name that was loading when the error occurred
        component: String,
        /// The underlying error, unmodified
        #[source]
        source: Box<ArmarError>,
    },
}

impl ArmarError {
    /// Wrap this error with the component that observed it.
    ///
    /// Structural and navigation errors already name their component and are
    /// left alone; driver pass-through errors gain a context layer.
    #[must_use]
    pub fn in_component(self, component: impl Into<String>) -> Self {
        match self {
            Self::StructuralValidation { .. } | Self::Navigation { .. } | Self::Context { .. } => {
                self
            }
            other => Self::Context {
                component: component.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, unwrapping any context layers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_message_names_contract() {
        let err = ArmarError::UnresolvedDependency {
            contract: "app::Widget".to_string(),
        };
        assert!(err.to_string().contains("app::Widget"));
    }

    #[test]
    fn test_cycle_message_carries_chain() {
        let err = ArmarError::DependencyCycle {
            chain: "A -> B -> A".to_string(),
        };
        assert!(err.to_string().contains("A -> B -> A"));
    }

    #[test]
    fn test_in_component_wraps_driver_errors() {
        let err = ArmarError::NodeNotFound {
            selector: ".pager".to_string(),
        }
        .in_component("Pager");
        assert!(matches!(err, ArmarError::Context { .. }));
        assert!(err.to_string().contains("Pager"));
        assert!(matches!(
            err.root_cause(),
            ArmarError::NodeNotFound { .. }
        ));
    }

    #[test]
    fn test_in_component_leaves_structural_errors_alone() {
        let err = ArmarError::StructuralValidation {
            component: "Grid".to_string(),
            selector: "table".to_string(),
            message: "wrong tag".to_string(),
        }
        .in_component("Page");
        assert!(matches!(err, ArmarError::StructuralValidation { .. }));
    }

    #[test]
    fn test_node_not_found_distinct_from_driver_unavailable() {
        let missing = ArmarError::NodeNotFound {
            selector: "#x".to_string(),
        };
        let gone = ArmarError::DriverUnavailable {
            message: "session closed".to_string(),
        };
        assert!(!matches!(missing, ArmarError::DriverUnavailable { .. }));
        assert!(!matches!(gone, ArmarError::NodeNotFound { .. }));
    }
}
