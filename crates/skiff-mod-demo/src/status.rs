use serde_json::json;

use skiff_core::{Context, HandlerInput, Module, SkiffError};

const TEMPLATE: &str = "<small>{{path}} | {{passes}} route(s)</small>";

/// Status bar answering every path through the `*` route.
#[derive(Default)]
pub struct Status {
    passes: u64,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Status {
    fn routes(&self) -> &[(&str, &str)] {
        &[("*", "track")]
    }

    fn template(&self) -> Option<&str> {
        Some(TEMPLATE)
    }

    fn handle(&mut self, handler: &str, ctx: &mut Context<'_>, _input: HandlerInput) -> Result<(), SkiffError> {
        match handler {
            "track" => {
                self.passes += 1;
                let path = ctx.current_path();
                let path = if path.is_empty() { "/".to_string() } else { path };
                ctx.render(&json!({ "path": path, "passes": self.passes }))
            }
            other => Err(ctx.unknown(other)),
        }
    }
}
