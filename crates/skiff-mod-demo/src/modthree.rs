use serde_json::json;

use skiff_core::{Context, HandlerInput, Module, SkiffError};

use crate::notification::{Level, Notification};

/// Navigation and notification showcase. Its template is fetched on first
/// activation and `utils/notification` is bound as `notification`.
#[derive(Default)]
pub struct ModThree {
    id: String,
}

impl ModThree {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self, ctx: &Context<'_>) -> Result<(), SkiffError> {
        let notice = notification(ctx).map(|n| n.markup()).unwrap_or_default();
        ctx.render(&json!({ "id": self.id, "notification": notice }))
    }

    fn notify(&self, ctx: &Context<'_>, handler: &str, level: Level, message: &str) -> Result<(), SkiffError> {
        let Some(n) = notification(ctx) else {
            return Err(ctx.fail(handler, "notification is not loaded"));
        };
        n.show(level, message);
        self.render(ctx)
    }
}

fn notification<'c>(ctx: &'c Context<'_>) -> Option<&'c Notification> {
    ctx.dependency_as::<Notification>("notification")
}

impl Module for ModThree {
    fn routes(&self) -> &[(&str, &str)] {
        &[("modthree", "render_module_three")]
    }

    fn events(&self) -> &[(&str, &str)] {
        &[
            ("click .one", "go_one"),
            ("click .two", "go_back"),
            ("click .show-success", "show_success"),
            ("click .show-warning", "show_warning"),
            ("click .show-error", "show_error"),
            ("click .hide-notification", "hide_notification"),
        ]
    }

    fn dependencies(&self) -> &[(&str, &str)] {
        &[("notification", "utils/notification")]
    }

    fn handle(&mut self, handler: &str, ctx: &mut Context<'_>, input: HandlerInput) -> Result<(), SkiffError> {
        match handler {
            "render_module_three" => {
                if let HandlerInput::Route(query) = &input {
                    self.id = query.get("id").unwrap_or_default().to_string();
                }
                self.render(ctx)
            }
            "go_back" => {
                ctx.navigate("modtwo");
                Ok(())
            }
            "go_one" => {
                ctx.navigate("modone");
                Ok(())
            }
            "show_success" => self.notify(ctx, handler, Level::Success, "This is a success message."),
            "show_warning" => self.notify(ctx, handler, Level::Warning, "This is a warning message."),
            "show_error" => self.notify(ctx, handler, Level::Error, "This is an error message."),
            "hide_notification" => {
                if let Some(n) = notification(ctx) {
                    n.hide();
                }
                self.render(ctx)
            }
            other => Err(ctx.unknown(other)),
        }
    }
}
