use std::rc::Rc;

use serde_json::Value;

use crate::app::{self, Runtime};
use crate::bus::Token;
use crate::deps::Dependency;
use crate::error::SkiffError;
use crate::fragment::Query;
use crate::module::HandlerInput;
use crate::processor;
use crate::registry::ScopeState;
use crate::render;

/// What a handler can see and do while it runs.
///
/// The context borrows the module's own state (template, mount, resolved
/// dependencies) and a handle to the runtime. Navigation requested here is
/// queued and runs after the current turn.
pub struct Context<'a> {
    state: &'a ScopeState,
    runtime: &'a Rc<Runtime>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(state: &'a ScopeState, runtime: &'a Rc<Runtime>) -> Self {
        Self { state, runtime }
    }

    pub fn module_id(&self) -> &str {
        self.state.id()
    }

    pub fn template(&self) -> Option<&str> {
        self.state.template()
    }

    /// A resolved dependency by its local name.
    pub fn dependency(&self, local_name: &str) -> Option<&Dependency> {
        self.state.resolved(local_name)
    }

    /// A resolved dependency by local name, downcast to its concrete type.
    pub fn dependency_as<T: 'static>(&self, local_name: &str) -> Option<&T> {
        self.state.resolved(local_name)?.downcast_ref::<T>()
    }

    /// Render the module's template with `data` into its mount point and
    /// delegate its declared events.
    pub fn render(&self, data: &Value) -> Result<(), SkiffError> {
        let Some(template) = self.state.template() else {
            return Err(SkiffError::TemplateUnavailable {
                module_id: self.module_id().to_string(),
                path: self.runtime.layout.path_for(self.module_id()),
            });
        };
        let Some(mount) = self.state.mount() else {
            tracing::warn!(module = self.module_id(), "render skipped, no mount point");
            return Ok(());
        };
        render::render_into(
            self.runtime.document.as_ref(),
            mount,
            self.module_id(),
            template,
            data,
            self.state.events(),
        );
        Ok(())
    }

    /// Empty the module's mount point.
    pub fn clear(&self) {
        if let Some(mount) = self.state.mount() {
            self.runtime.document.set_content(mount, "");
        }
    }

    /// Change the fragment to `#!/<path>` once the current turn finishes.
    pub fn navigate(&self, path: &str) {
        app::queue_navigate(self.runtime, path);
    }

    pub fn publish(&self, topic: &str, payload: Value) -> bool {
        self.runtime.bus.publish(topic, payload)
    }

    /// Subscribe one of this module's handlers to `topic`. It receives
    /// [`HandlerInput::Message`].
    pub fn subscribe(&self, topic: &str, handler: &str) -> Token {
        let weak = Rc::downgrade(self.runtime);
        let module_id = self.module_id().to_string();
        let handler = handler.to_string();
        self.runtime.bus.subscribe(topic, move |payload: &Value| {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            let input = HandlerInput::Message(payload.clone());
            if let Err(err) = processor::invoke(&runtime, &module_id, &handler, input) {
                tracing::warn!(module = %module_id, handler = %handler, error = %err, "message handler failed");
            }
        })
    }

    pub fn subscribe_with(&self, topic: &str, callback: impl Fn(&Value) + 'static) -> Token {
        self.runtime.bus.subscribe(topic, callback)
    }

    pub fn unsubscribe(&self, token: Token) -> Option<Token> {
        self.runtime.bus.unsubscribe(token)
    }

    pub fn store_get(&self, key: &str) -> Option<String> {
        self.runtime.store.borrow().get(key)
    }

    pub fn store_set(&self, key: &str, value: &str) {
        self.runtime.store.borrow_mut().set(key, value);
    }

    pub fn store_remove(&self, key: &str) {
        self.runtime.store.borrow_mut().remove(key);
    }

    /// Path segment of the latest router pass.
    pub fn current_path(&self) -> String {
        self.runtime.route_state.borrow().path.clone()
    }

    /// Query data of the latest router pass.
    pub fn current_query(&self) -> Query {
        self.runtime.route_state.borrow().query.clone()
    }

    pub fn unknown(&self, handler: &str) -> SkiffError {
        SkiffError::unknown_handler(self.module_id(), handler)
    }

    pub fn fail(&self, handler: &str, message: impl Into<String>) -> SkiffError {
        SkiffError::Handler {
            module_id: self.module_id().to_string(),
            handler: handler.to_string(),
            message: message.into(),
        }
    }
}
