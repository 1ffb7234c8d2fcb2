use serde_json::json;

use skiff_core::{Context, HandlerInput, Module, SkiffError};

use crate::modone::ALERT_TOPIC;
use crate::validation::Validation;

/// Store key holding how many times module two was shown.
pub const VISITS_KEY: &str = "modtwo.visits";

const EMAIL_RULES: [&str; 2] = ["required", "email"];

/// Form module. Its template is fetched on first activation; it validates
/// an email field through `utils/validation` and counts visits in the store.
#[derive(Default)]
pub struct ModTwo {
    email: String,
    status: String,
}

impl ModTwo {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self, ctx: &Context<'_>) -> Result<(), SkiffError> {
        let visits = ctx.store_get(VISITS_KEY).unwrap_or_else(|| "0".into());
        ctx.render(&json!({
            "visits": visits,
            "email": self.email,
            "status": self.status,
        }))
    }
}

impl Module for ModTwo {
    fn routes(&self) -> &[(&str, &str)] {
        &[("modtwo", "show")]
    }

    fn events(&self) -> &[(&str, &str)] {
        &[
            ("input .email", "check_email"),
            ("click .alert", "send_alert"),
            ("click .three", "go_three"),
        ]
    }

    fn dependencies(&self) -> &[(&str, &str)] {
        &[("validation", "utils/validation")]
    }

    fn handle(&mut self, handler: &str, ctx: &mut Context<'_>, input: HandlerInput) -> Result<(), SkiffError> {
        match handler {
            "show" => {
                let visits = ctx
                    .store_get(VISITS_KEY)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                ctx.store_set(VISITS_KEY, &(visits + 1).to_string());
                self.render(ctx)
            }
            "check_email" => {
                let HandlerInput::Event(event) = input else {
                    return Err(ctx.fail(handler, "expected an event"));
                };
                let Some(validation) = ctx.dependency_as::<Validation>("validation") else {
                    return Err(ctx.fail(handler, "validation is not loaded"));
                };
                self.email = event.value.unwrap_or_default();
                let failed = validation
                    .failures(&EMAIL_RULES, &self.email)
                    .map_err(|e| ctx.fail(handler, e.to_string()))?;
                self.status = if failed.is_empty() {
                    "valid".into()
                } else {
                    format!("invalid ({})", failed.join(", "))
                };
                self.render(ctx)
            }
            "send_alert" => {
                let message = if self.email.is_empty() {
                    "Hello from module two".to_string()
                } else {
                    format!("Module two saw {}", self.email)
                };
                ctx.publish(ALERT_TOPIC, json!({ "message": message }));
                Ok(())
            }
            "go_three" => {
                ctx.navigate("modthree?id=2");
                Ok(())
            }
            other => Err(ctx.unknown(other)),
        }
    }
}
