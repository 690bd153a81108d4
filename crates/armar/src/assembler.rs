//! Object-graph assembler: resolve, construct, load.
//!
//! The [`Assembler`] owns the registry built from ordered modules and is
//! the only entry point tests use to obtain pages and components:
//!
//! 1. **Resolve** - look up the requested contract's binding and run its
//!    provider, recursively resolving whatever the provider asks for. The
//!    in-progress resolution stack doubles as the cycle detector.
//! 2. **Load** - drive the resolved instance through the two-phase
//!    lifecycle exactly once per prepare call. Cached singletons that
//!    already reached `Loaded` are returned as-is, so preparing the same
//!    page twice never re-navigates.
//!
//! A component's `load` may call back into [`Assembler::prepare_component`]
//! for children scoped under its own bound node; that recursion is how a
//! grid assembles its pager and toolbar as independently validated
//! sub-components.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, trace, warn};

use crate::component::ComponentCore;
use crate::driver::Driver;
use crate::lifecycle::{LoadState, Loadable};
use crate::locator::Locator;
use crate::module::{Lifetime, Module, ModuleDescriptor, ModuleLoader};
use crate::page::PageCore;
use crate::registry::{ModuleInfo, Registry};
use crate::result::{ArmarError, ArmarResult};

/// Options controlling how an assembler gathers its modules.
#[derive(Debug)]
pub struct AssemblerOptions {
    load_modules: bool,
    discover_registered: bool,
    modules: Vec<Module>,
    descriptors: Vec<ModuleDescriptor>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            load_modules: true,
            discover_registered: true,
            modules: Vec::new(),
            descriptors: Vec::new(),
        }
    }
}

impl AssemblerOptions {
    /// Default options: load explicit modules and consult the
    /// process-global provider list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hermetic options: load only the modules given explicitly, ignoring
    /// the process-global provider list
    #[must_use]
    pub fn hermetic() -> Self {
        Self {
            discover_registered: false,
            ..Self::default()
        }
    }

    /// Skip module loading entirely, producing an empty registry
    #[must_use]
    pub fn without_modules() -> Self {
        Self {
            load_modules: false,
            discover_registered: false,
            ..Self::default()
        }
    }

    /// Add an explicit module
    #[must_use]
    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Add a module descriptor
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: ModuleDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Control whether the process-global provider list is consulted
    #[must_use]
    pub const fn discover_registered(mut self, discover: bool) -> Self {
        self.discover_registered = discover;
        self
    }
}

/// Locator scope handed to a component provider during
/// [`Assembler::prepare_component`].
#[derive(Debug, Clone)]
pub struct ComponentScope {
    locator: Locator,
    parent: Option<Weak<ComponentCore>>,
}

impl ComponentScope {
    /// The locator the component should bind to
    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Whether the component is scoped under a parent's bound node
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }
}

/// The object-graph assembler (factory).
///
/// One assembler serves one driver session. The registry it resolves from
/// is immutable once built and can be shared across sessions via
/// [`Assembler::with_registry`].
pub struct Assembler {
    driver: Arc<dyn Driver>,
    registry: Arc<Registry>,
    singletons: Mutex<HashMap<TypeId, Box<dyn std::any::Any + Send + Sync>>>,
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Assembler {
    /// Build an assembler, discovering modules per `options`.
    ///
    /// # Errors
    ///
    /// [`ArmarError::ModuleRegistration`] when any module producer fails -
    /// the assembler is not constructed from a partial module set.
    pub fn new(driver: Arc<dyn Driver>, options: AssemblerOptions) -> ArmarResult<Self> {
        let registry = if options.load_modules {
            let mut loader = ModuleLoader::new();
            for module in options.modules {
                loader = loader.with_module(module);
            }
            for descriptor in options.descriptors {
                loader = loader.with_descriptor(descriptor);
            }
            if options.discover_registered {
                loader = loader.with_registered();
            }
            Registry::build(loader.discover()?)
        } else {
            Registry::build(Vec::new())
        };
        debug!(
            modules = registry.modules().len(),
            contracts = registry.len(),
            "assembler ready"
        );
        Ok(Self::with_registry(driver, Arc::new(registry)))
    }

    /// Build an assembler over an already-built registry.
    ///
    /// This is how independent driver sessions share one immutable binding
    /// set while keeping their singleton caches separate.
    #[must_use]
    pub fn with_registry(driver: Arc<dyn Driver>, registry: Arc<Registry>) -> Self {
        Self {
            driver,
            registry,
            singletons: Mutex::new(HashMap::new()),
        }
    }

    /// The driver session this assembler serves
    #[must_use]
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// The backing registry
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// The applied modules, ascending by order
    #[must_use]
    pub fn registered_modules(&self) -> &[ModuleInfo] {
        self.registry.modules()
    }

    /// Resolve a page contract and drive it through the lifecycle.
    ///
    /// # Errors
    ///
    /// Resolution errors ([`ArmarError::UnresolvedDependency`],
    /// [`ArmarError::DependencyCycle`]) and any error the instance's `load`
    /// reports. No automatic retry is performed.
    pub fn prepare_page<P>(&self) -> ArmarResult<Arc<P>>
    where
        P: Loadable + ?Sized + 'static,
    {
        let mut resolver = Resolver::new(self, None);
        let instance = resolver.resolve::<P>()?;
        self.run_load(&instance)?;
        Ok(instance)
    }

    /// Resolve a component contract scoped to `locator` (under `parent`'s
    /// bound node when given) and drive it through the lifecycle.
    pub fn prepare_component<C>(
        &self,
        locator: Locator,
        parent: Option<Arc<ComponentCore>>,
    ) -> ArmarResult<Arc<C>>
    where
        C: Loadable + ?Sized + 'static,
    {
        let scope = ComponentScope {
            locator,
            parent: parent.map(|p| Arc::downgrade(&p)),
        };
        let mut resolver = Resolver::new(self, Some(scope));
        let instance = resolver.resolve::<C>()?;
        self.run_load(&instance)?;
        Ok(instance)
    }

    /// Resolve a contract without running the lifecycle - for collaborators
    /// that are plain services rather than pages or components.
    pub fn resolve<T>(&self) -> ArmarResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Resolver::new(self, None).resolve::<T>()
    }

    fn run_load<T>(&self, instance: &Arc<T>) -> ArmarResult<()>
    where
        T: Loadable + ?Sized + 'static,
    {
        if instance.load_state() == LoadState::Loaded {
            trace!(component = instance.name(), "already loaded, skipping");
            return Ok(());
        }
        debug!(component = instance.name(), "loading");
        match instance.load(self) {
            Ok(()) => {
                if instance.load_state() != LoadState::Loaded {
                    warn!(
                        component = instance.name(),
                        state = %instance.load_state(),
                        "load succeeded without reaching the loaded state"
                    );
                }
                Ok(())
            }
            Err(err) => {
                // A failed load must never be served from the singleton
                // cache as usable.
                let _ = self.singleton_lock().remove(&TypeId::of::<T>());
                Err(err)
            }
        }
    }

    fn singleton_lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<TypeId, Box<dyn std::any::Any + Send + Sync>>> {
        match self.singletons.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn cached_singleton<T>(&self, contract: TypeId) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.singleton_lock()
            .get(&contract)
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
    }

    fn cache_singleton<T>(&self, contract: TypeId, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let _ = self.singleton_lock().insert(contract, Box::new(instance));
    }
}

/// Recursive resolution context passed to provider closures.
///
/// Carries the in-progress resolution stack (the cycle detector) and, for
/// component preparation, the locator scope the component constructor
/// should bind to.
pub struct Resolver<'a> {
    assembler: &'a Assembler,
    scope: Option<ComponentScope>,
    stack: Vec<(TypeId, &'static str)>,
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("depth", &self.stack.len())
            .field("scoped", &self.scope.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Resolver<'a> {
    fn new(assembler: &'a Assembler, scope: Option<ComponentScope>) -> Self {
        Self {
            assembler,
            scope,
            stack: Vec::new(),
        }
    }

    /// The driver session being assembled against
    #[must_use]
    pub fn driver(&self) -> Arc<dyn Driver> {
        self.assembler.driver()
    }

    /// Resolve a dependency contract.
    ///
    /// # Errors
    ///
    /// [`ArmarError::UnresolvedDependency`] for an unbound contract and
    /// [`ArmarError::DependencyCycle`] when the contract is already on the
    /// in-progress resolution stack.
    pub fn resolve<T>(&mut self) -> ArmarResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let assembler = self.assembler;
        let contract = std::any::type_name::<T>();
        let id = TypeId::of::<T>();

        if self.stack.iter().any(|(existing, _)| *existing == id) {
            let mut chain: Vec<&'static str> =
                self.stack.iter().map(|(_, name)| *name).collect();
            chain.push(contract);
            return Err(ArmarError::DependencyCycle {
                chain: chain.join(" -> "),
            });
        }

        let binding =
            assembler
                .registry
                .get(id)
                .ok_or_else(|| ArmarError::UnresolvedDependency {
                    contract: contract.to_string(),
                })?;

        if binding.lifetime == Lifetime::Singleton {
            if let Some(cached) = assembler.cached_singleton::<T>(id) {
                trace!(contract, "returning cached singleton");
                return Ok(cached);
            }
        }

        trace!(contract, module = binding.module.as_str(), "constructing");
        self.stack.push((id, contract));
        let produced = (binding.provider.as_ref())(self);
        let _ = self.stack.pop();

        let instance = *produced?
            .downcast::<Arc<T>>()
            .map_err(|_| ArmarError::Provider {
                contract: contract.to_string(),
                message: "provider produced a value of the wrong type".to_string(),
            })?;

        if binding.lifetime == Lifetime::Singleton {
            assembler.cache_singleton(id, Arc::clone(&instance));
        }
        Ok(instance)
    }

    /// The locator scope of the current `prepare_component` call, if any
    #[must_use]
    pub fn scope(&self) -> Option<&ComponentScope> {
        self.scope.as_ref()
    }

    /// Build a [`ComponentCore`] from the current locator scope, named
    /// after the contract being resolved.
    ///
    /// # Errors
    ///
    /// [`ArmarError::Provider`] when called outside
    /// [`Assembler::prepare_component`] - a component constructor needs a
    /// locator to bind to.
    pub fn component_core(&self) -> ArmarResult<ComponentCore> {
        let contract = self
            .stack
            .last()
            .map_or("component", |(_, name)| *name);
        let scope = self.scope.as_ref().ok_or_else(|| ArmarError::Provider {
            contract: contract.to_string(),
            message: "component constructed outside prepare_component (no locator scope)"
                .to_string(),
        })?;
        let mut core =
            ComponentCore::new(self.assembler.driver(), scope.locator.clone()).named(contract);
        if let Some(parent) = &scope.parent {
            core = core.child_of_weak(parent.clone());
        }
        Ok(core)
    }

    /// Build a [`PageCore`] targeting `url`, named after the contract being
    /// resolved.
    #[must_use]
    pub fn page_core(&self, url: impl Into<String>) -> PageCore {
        let contract = self
            .stack
            .last()
            .map_or("page", |(_, name)| *name);
        PageCore::new(self.assembler.driver(), url).named(contract)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockNode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lifecycle bookkeeping for fake pages: counts loads, tracks state.
    struct LoadProbe {
        loads: AtomicUsize,
        state: Mutex<LoadState>,
    }

    impl LoadProbe {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                state: Mutex::new(LoadState::Constructed),
            }
        }

        fn record_load(&self) {
            let _ = self.loads.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = LoadState::Loaded;
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        fn state(&self) -> LoadState {
            *self.state.lock().unwrap()
        }
    }

    fn empty_driver() -> Arc<MockDriver> {
        let driver = Arc::new(MockDriver::new());
        driver.install_document(MockNode::new("main"));
        driver
    }

    fn hermetic(driver: &Arc<MockDriver>, modules: Vec<Module>) -> Assembler {
        let mut options = AssemblerOptions::hermetic();
        for module in modules {
            options = options.with_module(module);
        }
        Assembler::new(Arc::clone(driver) as Arc<dyn Driver>, options).unwrap()
    }

    // ------------------------------------------------------------------
    // Module ordering through the assembler
    // ------------------------------------------------------------------

    mod ordering_tests {
        use super::*;

        struct Marker;

        fn module(name: &str, order: i32) -> Module {
            Module::builder(name, order)
                .singleton::<Marker, _>(|_r| Ok(Arc::new(Marker)))
                .build()
        }

        #[test]
        fn test_modules_applied_ascending_regardless_of_input_order() {
            let assembler = hermetic(
                &empty_driver(),
                vec![module("c", 7), module("a", -1), module("b", 3)],
            );
            let names: Vec<&str> = assembler
                .registered_modules()
                .iter()
                .map(|m| m.name.as_str())
                .collect();
            assert_eq!(names, vec!["a", "b", "c"]);
        }

        #[test]
        fn test_equal_orders_keep_discovery_position() {
            for _ in 0..5 {
                let assembler = hermetic(
                    &empty_driver(),
                    vec![module("first", 2), module("second", 2), module("early", 1)],
                );
                let names: Vec<&str> = assembler
                    .registered_modules()
                    .iter()
                    .map(|m| m.name.as_str())
                    .collect();
                assert_eq!(names, vec!["early", "first", "second"]);
            }
        }

        #[test]
        fn test_failing_module_aborts_assembler_construction() {
            let options = AssemblerOptions::hermetic().with_descriptor(ModuleDescriptor::new(
                "broken",
                || {
                    Err(ArmarError::InvalidState {
                        message: "registration exploded".to_string(),
                    })
                },
            ));
            let err = Assembler::new(empty_driver() as Arc<dyn Driver>, options).unwrap_err();
            assert!(matches!(err, ArmarError::ModuleRegistration { .. }));
            assert!(err.to_string().contains("broken"));
        }
    }

    // ------------------------------------------------------------------
    // Resolution: lifetimes, overrides, failure modes
    // ------------------------------------------------------------------

    mod resolution_tests {
        use super::*;

        trait Service: Send + Sync {
            fn tag(&self) -> &'static str;
        }

        struct Plain;
        impl Service for Plain {
            fn tag(&self) -> &'static str {
                "plain"
            }
        }

        struct Fancy;
        impl Service for Fancy {
            fn tag(&self) -> &'static str {
                "fancy"
            }
        }

        #[test]
        fn test_later_module_overrides_earlier_binding() {
            let core = Module::builder("core", 0)
                .singleton::<dyn Service, _>(|_r| {
                    let service: Arc<dyn Service> = Arc::new(Plain);
                    Ok(service)
                })
                .build();
            let over = Module::builder("override", 1)
                .singleton::<dyn Service, _>(|_r| {
                    let service: Arc<dyn Service> = Arc::new(Fancy);
                    Ok(service)
                })
                .build();

            // Input order deliberately reversed; ascending order must win.
            let assembler = hermetic(&empty_driver(), vec![over, core]);
            let service = assembler.resolve::<dyn Service>().unwrap();
            assert_eq!(service.tag(), "fancy");
            assert_eq!(
                assembler.registry().provider_module::<dyn Service>(),
                Some("override")
            );
        }

        #[test]
        fn test_singleton_resolves_to_same_instance() {
            struct Shared;
            let module = Module::builder("core", 0)
                .singleton::<Shared, _>(|_r| Ok(Arc::new(Shared)))
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let first = assembler.resolve::<Shared>().unwrap();
            let second = assembler.resolve::<Shared>().unwrap();
            assert!(Arc::ptr_eq(&first, &second));
        }

        #[test]
        fn test_transient_resolves_to_fresh_instances() {
            struct Fresh;
            let module = Module::builder("core", 0)
                .transient::<Fresh, _>(|_r| Ok(Arc::new(Fresh)))
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let first = assembler.resolve::<Fresh>().unwrap();
            let second = assembler.resolve::<Fresh>().unwrap();
            assert!(!Arc::ptr_eq(&first, &second));
        }

        #[test]
        fn test_unresolved_contract_fails() {
            let assembler = hermetic(&empty_driver(), Vec::new());
            let err = assembler.resolve::<String>().unwrap_err();
            assert!(matches!(err, ArmarError::UnresolvedDependency { .. }));
        }

        #[test]
        fn test_unresolved_dependency_means_no_partial_construction() {
            static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);
            struct Missing;
            #[derive(Debug)]
            struct Outer;

            let module = Module::builder("core", 0)
                .singleton::<Outer, _>(|r| {
                    let _missing = r.resolve::<Missing>()?;
                    let _ = CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Outer))
                })
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let err = assembler.resolve::<Outer>().unwrap_err();
            assert!(matches!(err, ArmarError::UnresolvedDependency { .. }));
            assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_dependency_cycle_is_detected() {
            #[derive(Debug)]
            struct CycleA(#[allow(dead_code)] Arc<CycleB>);
            #[derive(Debug)]
            struct CycleB(#[allow(dead_code)] Arc<CycleA>);

            let module = Module::builder("core", 0)
                .singleton::<CycleA, _>(|r| Ok(Arc::new(CycleA(r.resolve::<CycleB>()?))))
                .singleton::<CycleB, _>(|r| Ok(Arc::new(CycleB(r.resolve::<CycleA>()?))))
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let err = assembler.resolve::<CycleA>().unwrap_err();
            match err {
                ArmarError::DependencyCycle { chain } => {
                    assert!(chain.contains("CycleA"));
                    assert!(chain.contains("CycleB"));
                }
                other => panic!("expected DependencyCycle, got {other:?}"),
            }
        }

        #[test]
        fn test_provider_dependencies_resolve_recursively() {
            struct Settings(&'static str);
            struct Client(Arc<Settings>);

            let module = Module::builder("core", 0)
                .singleton::<Settings, _>(|_r| Ok(Arc::new(Settings("https://app.test"))))
                .singleton::<Client, _>(|r| Ok(Arc::new(Client(r.resolve::<Settings>()?))))
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let client = assembler.resolve::<Client>().unwrap();
            assert_eq!(client.0 .0, "https://app.test");
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle through prepare_page
    // ------------------------------------------------------------------

    mod lifecycle_tests {
        use super::*;

        struct DashboardPage {
            probe: LoadProbe,
        }

        impl Loadable for DashboardPage {
            fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
                self.probe.record_load();
                Ok(())
            }

            fn load_state(&self) -> LoadState {
                self.probe.state()
            }
        }

        #[derive(Debug)]
        struct BrokenPage {
            state: Mutex<LoadState>,
        }

        impl Loadable for BrokenPage {
            fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
                *self.state.lock().unwrap() = LoadState::Failed;
                Err(ArmarError::Navigation {
                    url: "https://app.test/broken".to_string(),
                    message: "unreachable".to_string(),
                })
            }

            fn load_state(&self) -> LoadState {
                *self.state.lock().unwrap()
            }
        }

        #[test]
        fn test_singleton_page_loads_exactly_once() {
            let module = Module::builder("pages", 0)
                .singleton::<DashboardPage, _>(|_r| {
                    Ok(Arc::new(DashboardPage {
                        probe: LoadProbe::new(),
                    }))
                })
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let first = assembler.prepare_page::<DashboardPage>().unwrap();
            let second = assembler.prepare_page::<DashboardPage>().unwrap();

            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(first.probe.loads(), 1);
            assert_eq!(first.load_state(), LoadState::Loaded);
        }

        #[test]
        fn test_transient_page_loads_per_prepare() {
            let module = Module::builder("pages", 0)
                .transient::<DashboardPage, _>(|_r| {
                    Ok(Arc::new(DashboardPage {
                        probe: LoadProbe::new(),
                    }))
                })
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let first = assembler.prepare_page::<DashboardPage>().unwrap();
            let second = assembler.prepare_page::<DashboardPage>().unwrap();

            assert!(!Arc::ptr_eq(&first, &second));
            assert_eq!(first.probe.loads(), 1);
            assert_eq!(second.probe.loads(), 1);
        }

        #[test]
        fn test_failed_singleton_load_is_not_cached_as_usable() {
            let module = Module::builder("pages", 0)
                .singleton::<BrokenPage, _>(|_r| {
                    Ok(Arc::new(BrokenPage {
                        state: Mutex::new(LoadState::Constructed),
                    }))
                })
                .build();
            let assembler = hermetic(&empty_driver(), vec![module]);

            let err = assembler.prepare_page::<BrokenPage>().unwrap_err();
            assert!(matches!(err, ArmarError::Navigation { .. }));

            // The failure is observable again, never a cached Failed instance.
            let err = assembler.prepare_page::<BrokenPage>().unwrap_err();
            assert!(matches!(err, ArmarError::Navigation { .. }));
        }
    }

    // ------------------------------------------------------------------
    // End-to-end: widget override, loaded once
    // ------------------------------------------------------------------

    mod widget_override_tests {
        use super::*;

        trait Widget: Loadable {
            fn label(&self) -> &'static str;
            fn loads(&self) -> usize;
        }

        struct WidgetImpl {
            probe: LoadProbe,
        }

        impl Loadable for WidgetImpl {
            fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
                self.probe.record_load();
                Ok(())
            }

            fn load_state(&self) -> LoadState {
                self.probe.state()
            }
        }

        impl Widget for WidgetImpl {
            fn label(&self) -> &'static str {
                "widget"
            }

            fn loads(&self) -> usize {
                self.probe.loads()
            }
        }

        struct FancyWidgetImpl {
            probe: LoadProbe,
        }

        impl Loadable for FancyWidgetImpl {
            fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
                self.probe.record_load();
                Ok(())
            }

            fn load_state(&self) -> LoadState {
                self.probe.state()
            }
        }

        impl Widget for FancyWidgetImpl {
            fn label(&self) -> &'static str {
                "fancy-widget"
            }

            fn loads(&self) -> usize {
                self.probe.loads()
            }
        }

        #[test]
        fn test_override_module_wins_and_widget_loads_once() {
            let core = Module::builder("core", 0)
                .singleton::<dyn Widget, _>(|_r| {
                    let widget: Arc<dyn Widget> = Arc::new(WidgetImpl {
                        probe: LoadProbe::new(),
                    });
                    Ok(widget)
                })
                .build();
            let over = Module::builder("override", 1)
                .singleton::<dyn Widget, _>(|_r| {
                    let widget: Arc<dyn Widget> = Arc::new(FancyWidgetImpl {
                        probe: LoadProbe::new(),
                    });
                    Ok(widget)
                })
                .build();

            let assembler = hermetic(&empty_driver(), vec![core, over]);

            let widget = assembler.prepare_page::<dyn Widget>().unwrap();
            assert_eq!(widget.label(), "fancy-widget");
            assert_eq!(widget.load_state(), LoadState::Loaded);

            let again = assembler.prepare_page::<dyn Widget>().unwrap();
            assert!(Arc::ptr_eq(&widget, &again));
            assert_eq!(widget.loads(), 1);
        }
    }

    // ------------------------------------------------------------------
    // End-to-end: recursive grid/pager composition
    // ------------------------------------------------------------------

    mod grid_composition_tests {
        use super::*;

        #[derive(Debug)]
        struct Pager {
            core: Arc<ComponentCore>,
        }

        impl Loadable for Pager {
            fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
                self.core.bind()
            }

            fn load_state(&self) -> LoadState {
                self.core.state()
            }
        }

        #[derive(Debug)]
        struct Grid {
            core: Arc<ComponentCore>,
            pager: Mutex<Option<Arc<Pager>>>,
        }

        impl Loadable for Grid {
            fn load(&self, assembler: &Assembler) -> ArmarResult<()> {
                self.core.bind_with(|_node| {
                    let pager = assembler.prepare_component::<Pager>(
                        Locator::css(".pager"),
                        Some(Arc::clone(&self.core)),
                    )?;
                    *self.pager.lock().unwrap() = Some(pager);
                    Ok(())
                })
            }

            fn load_state(&self) -> LoadState {
                self.core.state()
            }
        }

        fn component_module() -> Module {
            Module::builder("components", 0)
                .transient::<Grid, _>(|r| {
                    Ok(Arc::new(Grid {
                        core: Arc::new(r.component_core()?.expect_tag("table")),
                        pager: Mutex::new(None),
                    }))
                })
                .transient::<Pager, _>(|r| {
                    Ok(Arc::new(Pager {
                        core: Arc::new(
                            r.component_core()?
                                .expect_tag("nav")
                                .expect_marker_class("pager"),
                        ),
                    }))
                })
                .build()
        }

        #[test]
        fn test_grid_recursively_prepares_pager_under_its_node() {
            let driver = Arc::new(MockDriver::new());
            driver.install_document(
                MockNode::new("main")
                    .with_child(MockNode::new("nav").with_class("pager").with_text("outer"))
                    .with_child(
                        MockNode::new("table")
                            .with_class("grid")
                            .with_child(MockNode::new("nav").with_class("pager").with_text("inner")),
                    ),
            );
            let assembler = hermetic(&driver, vec![component_module()]);

            let grid = assembler
                .prepare_component::<Grid>(Locator::css("table.grid"), None)
                .unwrap();

            assert_eq!(grid.load_state(), LoadState::Loaded);
            let pager = grid.pager.lock().unwrap().clone().unwrap();
            assert_eq!(pager.load_state(), LoadState::Loaded);
            // Scoped resolution must have found the grid's own pager.
            assert_eq!(
                pager.core.node().unwrap().text_content.as_deref(),
                Some("inner")
            );
        }

        #[test]
        fn test_missing_pager_fails_naming_the_pager() {
            let driver = Arc::new(MockDriver::new());
            driver.install_document(
                MockNode::new("main")
                    .with_child(MockNode::new("table").with_class("grid")),
            );
            let assembler = hermetic(&driver, vec![component_module()]);

            let err = assembler
                .prepare_component::<Grid>(Locator::css("table.grid"), None)
                .unwrap_err();

            match &err {
                ArmarError::StructuralValidation { component, .. } => {
                    assert!(component.contains("Pager"), "got component '{component}'");
                }
                other => panic!("expected StructuralValidation, got {other:?}"),
            }
        }

        #[test]
        fn test_grid_is_failed_after_pager_failure() {
            let driver = Arc::new(MockDriver::new());
            driver.install_document(
                MockNode::new("main")
                    .with_child(MockNode::new("table").with_class("grid")),
            );
            let assembler = hermetic(&driver, vec![component_module()]);

            // Keep the grid observable despite the failing prepare by
            // resolving it first and loading manually.
            let mut resolver = Resolver::new(
                &assembler,
                Some(ComponentScope {
                    locator: Locator::css("table.grid"),
                    parent: None,
                }),
            );
            let grid = resolver.resolve::<Grid>().unwrap();
            assert!(grid.load(&assembler).is_err());
            assert_eq!(grid.load_state(), LoadState::Failed);
        }

        #[test]
        fn test_component_provider_requires_locator_scope() {
            let driver = empty_driver();
            let assembler = hermetic(&driver, vec![component_module()]);

            // prepare_page carries no locator scope, so the component
            // constructor must refuse.
            let err = assembler.prepare_page::<Grid>().unwrap_err();
            assert!(matches!(err, ArmarError::Provider { .. }));
        }
    }

    // ------------------------------------------------------------------
    // Registry sharing across sessions
    // ------------------------------------------------------------------

    mod sharing_tests {
        use super::*;

        struct Shared;

        #[test]
        fn test_sessions_share_registry_but_not_singletons() {
            let module = Module::builder("core", 0)
                .singleton::<Shared, _>(|_r| Ok(Arc::new(Shared)))
                .build();
            let first = hermetic(&empty_driver(), vec![module]);
            let second =
                Assembler::with_registry(empty_driver() as Arc<dyn Driver>, first.registry());

            let a = first.resolve::<Shared>().unwrap();
            let b = second.resolve::<Shared>().unwrap();
            assert!(!Arc::ptr_eq(&a, &b));
            assert!(Arc::ptr_eq(&first.registry(), &second.registry()));
        }
    }
}
