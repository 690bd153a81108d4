//! Two-phase lifecycle: construct, then load.
//!
//! Every page and component moves through the same state machine:
//!
//! ```text
//! Constructed ──► Loading ──► Loaded
//!                    │
//!                    └──────► Failed
//! ```
//!
//! Construction is plain dependency injection and never touches the
//! document. `load` performs binding and validation; only a `Loaded`
//! instance may be used. Re-validation (`Loaded`/`Failed` back through
//! `Loading`) happens only by explicit caller contract - the assembler
//! itself invokes `load` exactly once per prepare call.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::assembler::Assembler;
use crate::result::ArmarResult;

/// Lifecycle state of a page or component instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    /// Dependencies injected; no document interaction has occurred
    Constructed,
    /// `load` is executing
    Loading,
    /// Terminal success; the bound node handle is valid
    Loaded,
    /// Terminal failure; the instance must not be used
    Failed,
}

impl LoadState {
    /// Whether this state ends a load attempt
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Failed)
    }

    /// Whether document-dependent members may be called
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Terminal states may re-enter `Loading` (explicit re-validation).
    #[must_use]
    pub const fn permits(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Constructed, Self::Loading)
                | (Self::Loading, Self::Loaded)
                | (Self::Loading, Self::Failed)
                | (Self::Loaded, Self::Loading)
                | (Self::Failed, Self::Loading)
        )
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Constructed => "constructed",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// The capability contract every page and component implements.
///
/// `load` binds the instance to the live document and validates what it
/// finds; `load_state` exposes the lifecycle state machine. The assembler
/// calls `load` at most once per `prepare_page`/`prepare_component` and
/// skips it entirely for singletons that already reached `Loaded`.
pub trait Loadable: Send + Sync {
    /// Bind and validate against the live document.
    ///
    /// May call back into the assembler to prepare nested components scoped
    /// under this instance's bound node. Any error must leave the instance
    /// in the `Failed` state.
    fn load(&self, assembler: &Assembler) -> ArmarResult<()>;

    /// Current lifecycle state
    fn load_state(&self) -> LoadState;

    /// Name used in logs and error context
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared lifecycle cell used by the page/component cores.
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<LoadState>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(LoadState::Constructed))
    }

    pub(crate) fn get(&self) -> LoadState {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Move to `next`, warning on transitions the state machine forbids.
    pub(crate) fn advance(&self, next: LoadState) {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !guard.permits(next) {
            tracing::warn!(from = %*guard, to = %next, "irregular lifecycle transition");
        }
        *guard = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod state_tests {
        use super::*;

        #[test]
        fn test_terminal_states() {
            assert!(LoadState::Loaded.is_terminal());
            assert!(LoadState::Failed.is_terminal());
            assert!(!LoadState::Constructed.is_terminal());
            assert!(!LoadState::Loading.is_terminal());
        }

        #[test]
        fn test_only_loaded_is_usable() {
            assert!(LoadState::Loaded.is_usable());
            assert!(!LoadState::Failed.is_usable());
            assert!(!LoadState::Constructed.is_usable());
            assert!(!LoadState::Loading.is_usable());
        }

        #[test]
        fn test_permitted_transitions() {
            assert!(LoadState::Constructed.permits(LoadState::Loading));
            assert!(LoadState::Loading.permits(LoadState::Loaded));
            assert!(LoadState::Loading.permits(LoadState::Failed));
        }

        #[test]
        fn test_revalidation_transitions() {
            assert!(LoadState::Loaded.permits(LoadState::Loading));
            assert!(LoadState::Failed.permits(LoadState::Loading));
        }

        #[test]
        fn test_forbidden_transitions() {
            assert!(!LoadState::Constructed.permits(LoadState::Loaded));
            assert!(!LoadState::Constructed.permits(LoadState::Failed));
            assert!(!LoadState::Loaded.permits(LoadState::Failed));
            assert!(!LoadState::Failed.permits(LoadState::Loaded));
        }

        #[test]
        fn test_display() {
            assert_eq!(format!("{}", LoadState::Loaded), "loaded");
            assert_eq!(format!("{}", LoadState::Failed), "failed");
        }
    }

    mod state_cell_tests {
        use super::*;

        #[test]
        fn test_starts_constructed() {
            let cell = StateCell::new();
            assert_eq!(cell.get(), LoadState::Constructed);
        }

        #[test]
        fn test_advance() {
            let cell = StateCell::new();
            cell.advance(LoadState::Loading);
            cell.advance(LoadState::Loaded);
            assert_eq!(cell.get(), LoadState::Loaded);
        }
    }
}
