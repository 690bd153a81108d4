//! Modules: named, ordered bundles of contract bindings.
//!
//! A module maps contract types to provider closures, each with a
//! [`Lifetime`]. Modules declare an integer `order`; the loader applies
//! them ascending, so a later module can shadow an earlier module's binding
//! for the same contract. Ties keep discovery order (stable sort), which
//! keeps the resulting registry deterministic across runs.
//!
//! There is no runtime type scanning. Discovery is explicit: module
//! instances, named module-producing descriptors, and an opt-in
//! process-global provider list populated by
//! [`register_module_provider`].

use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::assembler::Resolver;
use crate::result::{ArmarError, ArmarResult};

/// Instance caching behavior for a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance per assembler, cached after first resolution
    Singleton,
    /// A fresh instance per resolution, never cached
    Transient,
}

/// Type-erased provider closure. The box holds an `Arc<C>` for the
/// registered contract `C`; the resolver downcasts it back.
pub(crate) type Provider =
    Arc<dyn Fn(&mut Resolver<'_>) -> ArmarResult<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// One contract binding inside a module
#[derive(Clone)]
pub struct Registration {
    pub(crate) contract_id: TypeId,
    pub(crate) contract_name: &'static str,
    pub(crate) lifetime: Lifetime,
    pub(crate) provider: Provider,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("contract", &self.contract_name)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// A named, ordered bundle of contract bindings.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use armar::Module;
///
/// struct Settings {
///     base_url: String,
/// }
///
/// let module = Module::builder("core", 0)
///     .singleton::<Settings, _>(|_resolver| {
///         Ok(Arc::new(Settings {
///             base_url: "https://app.test".to_string(),
///         }))
///     })
///     .build();
/// assert_eq!(module.name(), "core");
/// assert_eq!(module.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    order: i32,
    pub(crate) registrations: Vec<Registration>,
}

impl Module {
    /// Start building a module with a name and order
    #[must_use]
    pub fn builder(name: impl Into<String>, order: i32) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            order,
            registrations: Vec::new(),
        }
    }

    /// The module name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module's relative order
    #[must_use]
    pub const fn order(&self) -> i32 {
        self.order
    }

    /// Number of registrations
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether the module registers nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Builder for [`Module`]
#[derive(Debug)]
pub struct ModuleBuilder {
    name: String,
    order: i32,
    registrations: Vec<Registration>,
}

impl ModuleBuilder {
    /// Register a provider for contract `C` with an explicit lifetime.
    ///
    /// The provider receives a [`Resolver`] and may resolve its own
    /// dependencies through it; registration order within the module is
    /// preserved.
    #[must_use]
    pub fn provide<C, F>(mut self, lifetime: Lifetime, ctor: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> ArmarResult<Arc<C>> + Send + Sync + 'static,
    {
        let provider: Provider = Arc::new(move |resolver| {
            let instance = ctor(resolver)?;
            Ok(Box::new(instance) as Box<dyn Any + Send + Sync>)
        });
        self.registrations.push(Registration {
            contract_id: TypeId::of::<C>(),
            contract_name: std::any::type_name::<C>(),
            lifetime,
            provider,
        });
        self
    }

    /// Register a singleton provider for contract `C`
    #[must_use]
    pub fn singleton<C, F>(self, ctor: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> ArmarResult<Arc<C>> + Send + Sync + 'static,
    {
        self.provide::<C, F>(Lifetime::Singleton, ctor)
    }

    /// Register a transient provider for contract `C`
    #[must_use]
    pub fn transient<C, F>(self, ctor: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> ArmarResult<Arc<C>> + Send + Sync + 'static,
    {
        self.provide::<C, F>(Lifetime::Transient, ctor)
    }

    /// Register an already-constructed singleton instance
    #[must_use]
    pub fn instance<C>(self, value: Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.provide::<C, _>(Lifetime::Singleton, move |_resolver| Ok(Arc::clone(&value)))
    }

    /// Finish the module
    #[must_use]
    pub fn build(self) -> Module {
        Module {
            name: self.name,
            order: self.order,
            registrations: self.registrations,
        }
    }
}

/// A named, fallible module producer - the discovery boundary.
///
/// A producer that fails aborts the whole discovery with
/// [`ArmarError::ModuleRegistration`] naming this descriptor, so partial
/// module sets are never observable.
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: String,
    produce: Arc<dyn Fn() -> ArmarResult<Module> + Send + Sync>,
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ModuleDescriptor {
    /// Create a descriptor from a name and a producer function
    #[must_use]
    pub fn new<F>(name: impl Into<String>, produce: F) -> Self
    where
        F: Fn() -> ArmarResult<Module> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            produce: Arc::new(produce),
        }
    }

    /// The descriptor name, used in registration failures
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Process-global provider list: deterministic, registration-order
/// preserving replacement for assembly scanning.
static REGISTERED: OnceLock<Mutex<Vec<ModuleDescriptor>>> = OnceLock::new();

fn registered() -> &'static Mutex<Vec<ModuleDescriptor>> {
    REGISTERED.get_or_init(|| Mutex::new(Vec::new()))
}

/// Add a module producer to the process-global provider list.
///
/// Assemblers built with default options consult this list; hermetic
/// assemblers ignore it.
pub fn register_module_provider(descriptor: ModuleDescriptor) {
    let mut guard = match registered().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.push(descriptor);
}

/// Snapshot of the process-global provider list, in registration order
#[must_use]
pub fn registered_module_providers() -> Vec<ModuleDescriptor> {
    let guard = match registered().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.clone()
}

/// Collects modules from explicit instances, descriptors, and the global
/// provider list, and returns them sorted ascending by order.
#[derive(Debug, Default)]
pub struct ModuleLoader {
    sources: Vec<ModuleSource>,
}

#[derive(Debug)]
enum ModuleSource {
    Instance(Module),
    Descriptor(ModuleDescriptor),
}

impl ModuleLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an explicit module instance
    #[must_use]
    pub fn with_module(mut self, module: Module) -> Self {
        self.sources.push(ModuleSource::Instance(module));
        self
    }

    /// Add a module descriptor
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: ModuleDescriptor) -> Self {
        self.sources.push(ModuleSource::Descriptor(descriptor));
        self
    }

    /// Append every descriptor from the process-global provider list
    #[must_use]
    pub fn with_registered(mut self) -> Self {
        for descriptor in registered_module_providers() {
            self.sources.push(ModuleSource::Descriptor(descriptor));
        }
        self
    }

    /// Produce and sort the module set.
    ///
    /// # Errors
    ///
    /// [`ArmarError::ModuleRegistration`] as soon as any producer fails; no
    /// partial module set is returned.
    pub fn discover(self) -> ArmarResult<Vec<Module>> {
        let mut modules = Vec::with_capacity(self.sources.len());
        for source in self.sources {
            match source {
                ModuleSource::Instance(module) => modules.push(module),
                ModuleSource::Descriptor(descriptor) => {
                    let module =
                        (descriptor.produce)().map_err(|err| ArmarError::ModuleRegistration {
                            module: descriptor.name.clone(),
                            message: err.to_string(),
                        })?;
                    modules.push(module);
                }
            }
        }
        // Stable: equal orders keep discovery order.
        modules.sort_by_key(Module::order);
        for module in &modules {
            debug!(
                module = module.name(),
                order = module.order(),
                registrations = module.len(),
                "module discovered"
            );
        }
        Ok(modules)
    }
}
