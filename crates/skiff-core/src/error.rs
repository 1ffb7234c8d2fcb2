/// Failures surfaced by the runtime.
///
/// Most of these never reach a caller: activation failures are logged and the
/// activation is abandoned. They are still typed so tests and the console can
/// inspect them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkiffError {
    UnknownModule(String),
    UnknownHandler {
        module_id: String,
        handler: String,
    },
    TemplateUnavailable {
        module_id: String,
        path: String,
    },
    DependencyLoad {
        source_id: String,
        message: String,
    },
    Handler {
        module_id: String,
        handler: String,
        message: String,
    },
    /// A handler tried to reach the registry while another handler held it.
    Busy(String),
    AlreadyStarted,
    NotStarted,
}

impl SkiffError {
    pub fn unknown_handler(module_id: &str, handler: &str) -> Self {
        Self::UnknownHandler {
            module_id: module_id.to_string(),
            handler: handler.to_string(),
        }
    }

    pub fn dependency(source_id: &str, message: impl Into<String>) -> Self {
        Self::DependencyLoad {
            source_id: source_id.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SkiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModule(id) => write!(f, "unknown module id: {id}"),
            Self::UnknownHandler { module_id, handler } => {
                write!(f, "module {module_id} has no handler named {handler}")
            }
            Self::TemplateUnavailable { module_id, path } => {
                write!(f, "error loading template {path} for module {module_id}")
            }
            Self::DependencyLoad { source_id, message } => {
                write!(f, "failed to load dependency {source_id}: {message}")
            }
            Self::Handler {
                module_id,
                handler,
                message,
            } => write!(f, "{module_id}.{handler} failed: {message}"),
            Self::Busy(id) => write!(f, "module registry is busy, cannot reach {id}"),
            Self::AlreadyStarted => write!(f, "application already started"),
            Self::NotStarted => write!(f, "application has not been started"),
        }
    }
}

impl std::error::Error for SkiffError {}
