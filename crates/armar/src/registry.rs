//! Registry: the resolved, ordered set of bindings backing the assembler.
//!
//! Built once from a sorted module set and immutable afterwards, so an
//! `Arc<Registry>` can back any number of independent driver sessions.
//! Applying modules in ascending order means a later module's registration
//! for a contract replaces an earlier one - the override mechanism the
//! whole module system is built around.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::trace;

use crate::module::{Lifetime, Module, Provider};

/// Introspection record for one applied module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module name
    pub name: String,
    /// Declared order
    pub order: i32,
    /// Number of registrations the module contributed
    pub registrations: usize,
}

/// The winning binding for one contract
pub(crate) struct Binding {
    pub(crate) lifetime: Lifetime,
    pub(crate) provider: Provider,
    pub(crate) contract_name: &'static str,
    pub(crate) module: String,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("contract", &self.contract_name)
            .field("lifetime", &self.lifetime)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

/// Immutable contract-to-binding store
#[derive(Debug, Default)]
pub struct Registry {
    bindings: HashMap<TypeId, Binding>,
    modules: Vec<ModuleInfo>,
}

impl Registry {
    /// Apply a module set, assumed already sorted ascending by order.
    ///
    /// Registrations apply in declaration order within a module and module
    /// order across modules, so later entries shadow earlier ones.
    #[must_use]
    pub fn build(modules: Vec<Module>) -> Self {
        let mut registry = Self::default();
        for module in modules {
            registry.modules.push(ModuleInfo {
                name: module.name().to_string(),
                order: module.order(),
                registrations: module.len(),
            });
            let module_name = module.name().to_string();
            for registration in module.registrations {
                if let Some(previous) = registry.bindings.get(&registration.contract_id) {
                    trace!(
                        contract = registration.contract_name,
                        winner = module_name.as_str(),
                        shadowed = previous.module.as_str(),
                        "binding overridden"
                    );
                }
                let _ = registry.bindings.insert(
                    registration.contract_id,
                    Binding {
                        lifetime: registration.lifetime,
                        provider: registration.provider,
                        contract_name: registration.contract_name,
                        module: module_name.clone(),
                    },
                );
            }
        }
        registry
    }

    /// The applied modules, in application order
    #[must_use]
    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    /// Number of distinct bound contracts
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no contract is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether contract `T` has a binding
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<T>())
    }

    /// Name of the module that supplied the winning binding for `T`
    #[must_use]
    pub fn provider_module<T: ?Sized + 'static>(&self) -> Option<&str> {
        self.bindings
            .get(&TypeId::of::<T>())
            .map(|binding| binding.module.as_str())
    }

    /// Names of every bound contract (unordered)
    #[must_use]
    pub fn contracts(&self) -> Vec<&'static str> {
        self.bindings
            .values()
            .map(|binding| binding.contract_name)
            .collect()
    }

    pub(crate) fn get(&self, contract: TypeId) -> Option<&Binding> {
        self.bindings.get(&contract)
    }
}
