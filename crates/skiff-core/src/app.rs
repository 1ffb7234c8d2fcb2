use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{bail, Result};
use futures::executor::{LocalPool, LocalSpawner};
use serde_json::Value;

use crate::bus::{Token, TopicBus};
use crate::deps::{Dependency, DependencyCache};
use crate::document::{Document, MemoryDocument};
use crate::error::SkiffError;
use crate::fragment::{self, to_fragment};
use crate::loader::{
    DependencyLoader, FactoryLoader, MemoryTemplates, PendingTemplate, TemplateLayout, TemplateSource,
};
use crate::module::{DomEvent, HandlerInput, Module};
use crate::processor;
use crate::registry::ModuleRegistry;
use crate::route::RouteTable;
use crate::router;
use crate::state::RouteState;
use crate::store::Store;
use crate::task::TaskQueue;

/// Shared application context. Every component reaches the others through
/// this value; there is no global state.
pub(crate) struct Runtime {
    pub(crate) registry: RefCell<ModuleRegistry>,
    pub(crate) routes: RefCell<RouteTable>,
    pub(crate) deps: RefCell<DependencyCache>,
    pub(crate) bus: TopicBus,
    pub(crate) tasks: TaskQueue,
    pub(crate) route_state: RefCell<RouteState>,
    pub(crate) store: RefCell<Store>,
    pub(crate) document: Rc<dyn Document>,
    pub(crate) templates: Rc<dyn TemplateSource>,
    /// In-flight template fetches by module id.
    pub(crate) pending_templates: RefCell<HashMap<String, PendingTemplate>>,
    pub(crate) loader: Rc<dyn DependencyLoader>,
    pub(crate) layout: TemplateLayout,
    pub(crate) spawner: LocalSpawner,
    started: Cell<bool>,
}

/// Builder for [`App`]. Every collaborator has an in-memory default.
pub struct AppBuilder {
    document: Rc<dyn Document>,
    templates: Rc<dyn TemplateSource>,
    loader: Rc<dyn DependencyLoader>,
    store: Store,
    layout: TemplateLayout,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            document: Rc::new(MemoryDocument::new()),
            templates: Rc::new(MemoryTemplates::new()),
            loader: Rc::new(FactoryLoader::new()),
            store: Store::default(),
            layout: TemplateLayout::default(),
        }
    }

    pub fn document(mut self, document: Rc<dyn Document>) -> Self {
        self.document = document;
        self
    }

    pub fn templates(mut self, templates: Rc<dyn TemplateSource>) -> Self {
        self.templates = templates;
        self
    }

    pub fn loader(mut self, loader: Rc<dyn DependencyLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn store(mut self, store: Store) -> Self {
        self.store = store;
        self
    }

    pub fn template_layout(mut self, layout: TemplateLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn build(self) -> App {
        let pool = LocalPool::new();
        let tasks = TaskQueue::new();
        let runtime = Runtime {
            registry: RefCell::new(ModuleRegistry::new()),
            routes: RefCell::new(RouteTable::new()),
            deps: RefCell::new(DependencyCache::new()),
            bus: TopicBus::new(tasks.clone()),
            tasks,
            route_state: RefCell::new(RouteState::new()),
            store: RefCell::new(self.store),
            document: self.document,
            templates: self.templates,
            pending_templates: RefCell::new(HashMap::new()),
            loader: self.loader,
            layout: self.layout,
            spawner: pool.spawner(),
            started: Cell::new(false),
        };
        App {
            runtime: Rc::new(runtime),
            pool,
        }
    }
}

/// A running single-page application.
///
/// Lifecycle: register modules, [`start`](App::start) once (which builds the
/// route table and routes the initial fragment), then feed navigation and
/// events, calling [`run_until_idle`](App::run_until_idle) to let deferred
/// work finish.
pub struct App {
    runtime: Rc<Runtime>,
    pool: LocalPool,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Register a module under `key`. Its id is the last `/` segment of the
    /// key. Modules can only be registered before [`start`](App::start).
    pub fn register(&mut self, key: &str, module: Box<dyn Module>) -> Result<String> {
        if self.runtime.started.get() {
            bail!("cannot register {} after the application started", key);
        }
        let document = self.runtime.document.clone();
        self.runtime
            .registry
            .borrow_mut()
            .register(key, module, document.as_ref())
    }

    /// Build the route table and route `initial_fragment`.
    pub fn start(&mut self, initial_fragment: &str) -> Result<(), SkiffError> {
        if self.runtime.started.replace(true) {
            return Err(SkiffError::AlreadyStarted);
        }
        let table = RouteTable::build(&self.runtime.registry.borrow());
        tracing::info!(
            modules = self.runtime.registry.borrow().len(),
            patterns = table.len(),
            "application started"
        );
        *self.runtime.routes.borrow_mut() = table;

        self.runtime
            .route_state
            .borrow_mut()
            .push_location(initial_fragment);
        load_url(&self.runtime, initial_fragment);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.runtime.started.get()
    }

    /// Navigate to `path`: record `#!/<path>` and run a router pass.
    pub fn navigate(&mut self, path: &str) -> Result<(), SkiffError> {
        self.ensure_started()?;
        navigate(&self.runtime, path);
        Ok(())
    }

    /// The location's fragment changed from outside (the user edited it or
    /// went back).
    pub fn hash_changed(&mut self, fragment: &str) -> Result<(), SkiffError> {
        self.ensure_started()?;
        self.runtime.route_state.borrow_mut().push_location(fragment);
        load_url(&self.runtime, fragment);
        Ok(())
    }

    /// Fire a delegated event on a mount point. Returns how many bindings
    /// handled it.
    pub fn fire(&mut self, mount_id: &str, event_type: &str, selector: &str, value: Option<&str>) -> usize {
        let Some(mount) = self.runtime.document.resolve(mount_id) else {
            tracing::warn!(mount = mount_id, "fire on unknown mount point");
            return 0;
        };
        let bindings = self.runtime.document.bindings(&mount, event_type, selector);
        for binding in &bindings {
            let input = HandlerInput::Event(DomEvent {
                event_type: event_type.to_string(),
                mount: mount_id.to_string(),
                selector: selector.to_string(),
                value: value.map(str::to_string),
            });
            if let Err(err) = processor::invoke(&self.runtime, &binding.module_id, &binding.handler, input) {
                tracing::warn!(module = %binding.module_id, handler = %binding.handler, error = %err, "event handler failed");
            }
        }
        bindings.len()
    }

    pub fn publish(&self, topic: &str, payload: Value) -> bool {
        self.runtime.bus.publish(topic, payload)
    }

    pub fn subscribe(&self, topic: &str, callback: impl Fn(&Value) + 'static) -> Token {
        self.runtime.bus.subscribe(topic, callback)
    }

    pub fn unsubscribe(&self, token: Token) -> Option<Token> {
        self.runtime.bus.unsubscribe(token)
    }

    pub fn bus(&self) -> &TopicBus {
        &self.runtime.bus
    }

    /// Drive pending activations and deferred tasks until nothing can make
    /// progress. Returns how many deferred tasks ran.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        loop {
            self.pool.run_until_stalled();
            if !self.runtime.tasks.run_next() {
                break;
            }
            ran += 1;
        }
        ran
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.runtime.tasks.has_pending()
    }

    pub fn route_state(&self) -> RouteState {
        self.runtime.route_state.borrow().clone()
    }

    pub fn routes(&self) -> Ref<'_, RouteTable> {
        self.runtime.routes.borrow()
    }

    /// Module ids in registration order.
    pub fn module_ids(&self) -> Vec<String> {
        self.runtime
            .registry
            .borrow()
            .ids()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn content(&self, mount_id: &str) -> Option<String> {
        let mount = self.runtime.document.resolve(mount_id)?;
        self.runtime.document.content(&mount)
    }

    pub fn template(&self, module_id: &str) -> Option<String> {
        let registry = self.runtime.registry.borrow();
        registry.get(module_id)?.state().template().map(str::to_string)
    }

    /// The dependency bound to `module_id` under `local_name`.
    pub fn module_dependency(&self, module_id: &str, local_name: &str) -> Option<Dependency> {
        let registry = self.runtime.registry.borrow();
        registry.get(module_id)?.state().resolved(local_name).cloned()
    }

    /// The cached instance for a dependency source id.
    pub fn dependency(&self, source_id: &str) -> Option<Dependency> {
        self.runtime.deps.borrow().get(source_id)
    }

    pub fn cached_sources(&self) -> Vec<String> {
        self.runtime.deps.borrow().sources()
    }

    pub fn store(&self) -> RefMut<'_, Store> {
        self.runtime.store.borrow_mut()
    }

    fn ensure_started(&self) -> Result<(), SkiffError> {
        if self.runtime.started.get() {
            Ok(())
        } else {
            Err(SkiffError::NotStarted)
        }
    }
}

/// One router pass over `fragment`.
pub(crate) fn load_url(runtime: &Rc<Runtime>, fragment: &str) {
    let parsed = fragment::parse(fragment);
    runtime.route_state.borrow_mut().record_pass(&parsed);

    let plan = router::plan(&runtime.routes.borrow(), &parsed.path);
    tracing::info!(
        path = %parsed.path,
        activations = plan.activations.len(),
        cleared = plan.cleared.len(),
        "routing"
    );

    for module_id in &plan.cleared {
        clear_mount(runtime, module_id);
    }
    for target in plan.activations {
        processor::dispatch(runtime, target, parsed.query.clone());
    }
}

pub(crate) fn navigate(runtime: &Rc<Runtime>, path: &str) {
    let fragment = to_fragment(path);
    runtime.route_state.borrow_mut().push_location(&fragment);
    load_url(runtime, &fragment);
}

/// Navigate after the current turn. Used from inside handlers so router
/// passes never nest.
pub(crate) fn queue_navigate(runtime: &Rc<Runtime>, path: &str) {
    let weak = Rc::downgrade(runtime);
    let path = path.to_string();
    runtime.tasks.schedule(move || {
        if let Some(runtime) = weak.upgrade() {
            navigate(&runtime, &path);
        }
    });
}

fn clear_mount(runtime: &Rc<Runtime>, module_id: &str) {
    let registry = runtime.registry.borrow();
    let Some(mount) = registry.get(module_id).and_then(|s| s.state().mount().cloned()) else {
        return;
    };
    drop(registry);
    tracing::debug!(module = module_id, "clearing mount");
    runtime.document.set_content(&mount, "");
}
