use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::document::{Binding, Document, MountPoint};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder pattern"));

static EVENT_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s*(.*)$").expect("event key pattern"));

/// Replace every `{{NAME}}` in `template` with `data[NAME]`.
///
/// Strings are inserted verbatim, other JSON values in their JSON form and
/// missing names as the empty string.
pub fn interpolate(template: &str, data: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match data.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
        .into_owned()
}

/// Split an event declaration key into `(event type, selector)`.
///
/// Returns `None` for keys without an event type.
pub fn split_event_key(key: &str) -> Option<(&str, &str)> {
    let caps = EVENT_KEY.captures(key)?;
    let event_type = caps.get(1)?.as_str();
    let selector = caps.get(2).map_or("", |m| m.as_str());
    Some((event_type, selector))
}

/// Bind every declared event of `module_id` on `mount`. Returns how many
/// bindings were made.
pub fn delegate_events(
    document: &dyn Document,
    mount: &MountPoint,
    module_id: &str,
    events: &[(String, String)],
) -> usize {
    let mut bound = 0;
    for (key, handler) in events {
        let Some((event_type, selector)) = split_event_key(key) else {
            tracing::warn!(module = module_id, key = %key, "malformed event declaration");
            continue;
        };
        document.bind(
            mount,
            Binding {
                event_type: event_type.to_string(),
                selector: selector.to_string(),
                module_id: module_id.to_string(),
                handler: handler.clone(),
            },
        );
        bound += 1;
    }
    bound
}

/// Render `template` with `data` into `mount`, then delegate `events`.
pub fn render_into(
    document: &dyn Document,
    mount: &MountPoint,
    module_id: &str,
    template: &str,
    data: &Value,
    events: &[(String, String)],
) {
    let html = interpolate(template, data);
    document.set_content(mount, &html);
    let bound = delegate_events(document, mount, module_id, events);
    tracing::debug!(module = module_id, bytes = html.len(), bindings = bound, "rendered");
}
