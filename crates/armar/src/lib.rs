//! Armar: page-object assembly engine for browser test automation.
//!
//! Armar (Spanish: "to assemble") builds and binds page-object graphs:
//! typed wrappers over regions of a live document, resolved from ordered
//! module bindings and driven through a validation-and-binding lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ARMAR Assembly Pipeline                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Modules    │    │ Registry   │    │ Assembler  │            │
//! │   │ (ordered   │───►│ (contract  │───►│ (resolve + │──► Loaded  │
//! │   │  bindings) │    │  bindings) │    │  lifecycle)│    pages   │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │ recursion for     │
//! │                                             ▼ nested components │
//! │                                      ┌────────────┐             │
//! │                                      │ Driver     │             │
//! │                                      │ (external) │             │
//! │                                      └────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Module`] is an ordered bundle of contract bindings; the loader
//! stable-sorts modules so later ones shadow earlier bindings. The
//! [`Assembler`] resolves a requested page or component from the registry,
//! constructing provider-declared dependencies recursively with cycle
//! detection, then drives the instance through the
//! `Constructed -> Loading -> {Loaded | Failed}` state machine. A
//! component's `load` may recurse into the assembler for children scoped
//! under its own bound node - a grid preparing its pager and toolbar as
//! independently validated sub-components.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use armar::{
//!     Assembler, AssemblerOptions, ArmarResult, ComponentCore, LoadState, Loadable, Locator,
//!     MockDriver, MockNode, Module,
//! };
//!
//! struct SearchBox {
//!     core: Arc<ComponentCore>,
//! }
//!
//! impl Loadable for SearchBox {
//!     fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
//!         self.core.bind()
//!     }
//!
//!     fn load_state(&self) -> LoadState {
//!         self.core.state()
//!     }
//! }
//!
//! # fn main() -> ArmarResult<()> {
//! let driver = Arc::new(MockDriver::new());
//! driver.install_document(
//!     MockNode::new("main").with_child(MockNode::new("input").with_class("search")),
//! );
//!
//! let module = Module::builder("widgets", 0)
//!     .transient::<SearchBox, _>(|r| {
//!         Ok(Arc::new(SearchBox {
//!             core: Arc::new(r.component_core()?.expect_tag("input")),
//!         }))
//!     })
//!     .build();
//!
//! let assembler = Assembler::new(driver, AssemblerOptions::hermetic().with_module(module))?;
//! let search = assembler.prepare_component::<SearchBox>(Locator::css(".search"), None)?;
//! assert_eq!(search.load_state(), LoadState::Loaded);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Object-graph assembler: registry-backed resolution plus the two-phase
/// lifecycle.
mod assembler;

/// Component binding: locator resolution and structural validation.
mod component;

/// Driver boundary and in-memory mock.
mod driver;

/// Lifecycle state machine and the `Loadable` capability contract.
mod lifecycle;

/// Composable query descriptors.
#[allow(clippy::missing_errors_doc)]
mod locator;

/// Ordered module bundles and discovery.
mod module;

/// Page binding: navigation and URL confirmation.
mod page;

/// The contract-to-binding store.
mod registry;

mod result;

/// Poll-until-condition helpers.
mod wait;

pub use assembler::{Assembler, AssemblerOptions, ComponentScope, Resolver};
pub use component::{ComponentCore, NodeValidator};
pub use driver::{Driver, MockDriver, MockNode, NodeHandle};
pub use lifecycle::{LoadState, Loadable};
pub use locator::{Locator, Strategy};
pub use module::{
    register_module_provider, registered_module_providers, Lifetime, Module, ModuleBuilder,
    ModuleDescriptor, ModuleLoader, Registration,
};
pub use page::{PageCore, UrlMatcher};
pub use registry::{ModuleInfo, Registry};
pub use result::{ArmarError, ArmarResult};
pub use wait::{
    wait_until, WaitOptions, Waiter, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        register_module_provider, wait_until, ArmarError, ArmarResult, Assembler,
        AssemblerOptions, ComponentCore, Driver, Lifetime, LoadState, Loadable, Locator,
        MockDriver, MockNode, Module, ModuleDescriptor, ModuleLoader, NodeHandle, PageCore,
        Registry, Strategy, UrlMatcher, WaitOptions, Waiter,
    };
}
