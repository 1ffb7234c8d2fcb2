use serde_json::Value;

use crate::context::Context;
use crate::error::SkiffError;
use crate::fragment::Query;

/// A delegated DOM-style event delivered to a module handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub event_type: String,
    /// Mount point the binding lives on.
    pub mount: String,
    /// Selector inside the mount; empty for the mount itself.
    pub selector: String,
    /// Value carried by the event source, if any (e.g. an input's text).
    pub value: Option<String>,
}

/// What triggered a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerInput {
    /// A route matched; carries the fragment's query data.
    Route(Query),
    /// A delegated event fired on the module's mount.
    Event(DomEvent),
    /// A topic the module subscribed a handler to was published.
    Message(Value),
}

/// A self-contained application section.
///
/// Modules only declare things: which route patterns they answer, which
/// events they delegate, which dependencies they need and, optionally, an
/// inline template. The runtime drives everything else and calls back into
/// [`handle`](Module::handle) by handler name.
///
/// Declarations are read once, when the module is registered with
/// [`crate::registry::ModuleRegistry`].
pub trait Module {
    /// Ordered `pattern → handler` pairs. `"*"` matches every path.
    fn routes(&self) -> &[(&str, &str)] {
        &[]
    }

    /// Ordered `"<eventType> <selector>" → handler` pairs.
    fn events(&self) -> &[(&str, &str)] {
        &[]
    }

    /// Ordered `local name → dependency source id` pairs.
    fn dependencies(&self) -> &[(&str, &str)] {
        &[]
    }

    /// Inline template. When `None` the template is fetched on first
    /// activation.
    fn template(&self) -> Option<&str> {
        None
    }

    /// Run the handler called `handler`.
    ///
    /// Modules should answer unknown names with
    /// [`SkiffError::UnknownHandler`].
    fn handle(
        &mut self,
        handler: &str,
        ctx: &mut Context<'_>,
        input: HandlerInput,
    ) -> Result<(), SkiffError>;
}
