use serde_json::{json, Value};

use skiff_core::bus::Token;
use skiff_core::{Context, HandlerInput, Module, SkiffError};

/// Topic other modules publish alerts on.
pub const ALERT_TOPIC: &str = "alert";

const TEMPLATE: &str = "<h1>Module one</h1>
<p class=\"alert\">{{alert}}</p>
<a class=\"two\">Go to module two</a>";

/// Landing module with an inline template. Shows the latest alert
/// published on [`ALERT_TOPIC`].
#[derive(Default)]
pub struct ModOne {
    alert: String,
    subscription: Option<Token>,
}

impl ModOne {
    pub fn new() -> Self {
        Self::default()
    }

    fn view(&self) -> Value {
        json!({ "alert": self.alert })
    }
}

impl Module for ModOne {
    fn routes(&self) -> &[(&str, &str)] {
        &[("modone", "render"), ("", "render")]
    }

    fn events(&self) -> &[(&str, &str)] {
        &[("click .two", "go_two"), ("click .alert", "dismiss")]
    }

    fn template(&self) -> Option<&str> {
        Some(TEMPLATE)
    }

    fn handle(&mut self, handler: &str, ctx: &mut Context<'_>, input: HandlerInput) -> Result<(), SkiffError> {
        match handler {
            "render" => {
                if self.subscription.is_none() {
                    self.subscription = Some(ctx.subscribe(ALERT_TOPIC, "show_alert"));
                }
                ctx.render(&self.view())
            }
            "show_alert" => {
                let HandlerInput::Message(payload) = input else {
                    return Err(ctx.fail(handler, "expected a message"));
                };
                self.alert = match payload.get("message") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                if ctx.current_path() == "modone" || ctx.current_path().is_empty() {
                    ctx.render(&self.view())?;
                }
                Ok(())
            }
            "dismiss" => {
                self.alert.clear();
                ctx.render(&self.view())
            }
            "go_two" => {
                ctx.navigate("modtwo");
                Ok(())
            }
            other => Err(ctx.unknown(other)),
        }
    }
}
