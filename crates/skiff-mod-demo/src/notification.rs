use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(Level::Success),
            "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown notification level: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

/// The `utils/notification` dependency: a single visible notice at a time.
///
/// Instances are shared between every module that declares the dependency,
/// so state lives behind a `RefCell`.
#[derive(Debug, Default)]
pub struct Notification {
    current: RefCell<Option<Notice>>,
    shown: RefCell<usize>,
}

impl Notification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible notice.
    pub fn show(&self, level: Level, message: &str) {
        tracing::debug!(%level, message, "showing notification");
        *self.current.borrow_mut() = Some(Notice {
            level,
            message: message.to_string(),
        });
        *self.shown.borrow_mut() += 1;
    }

    pub fn hide(&self) {
        self.current.borrow_mut().take();
    }

    pub fn current(&self) -> Option<Notice> {
        self.current.borrow().clone()
    }

    /// Notices shown since creation.
    pub fn shown(&self) -> usize {
        *self.shown.borrow()
    }

    /// Markup for the visible notice, or an empty string.
    pub fn markup(&self) -> String {
        match &*self.current.borrow() {
            Some(notice) => format!(
                "<div class=\"notification {}\">{}</div>",
                notice.level, notice.message
            ),
            None => String::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        match &*self.current.borrow() {
            Some(notice) => json!({ "level": notice.level.as_str(), "message": notice.message }),
            None => Value::Null,
        }
    }
}
