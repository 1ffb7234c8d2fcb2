use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "skiff.log";
const RECENT_CAPACITY: usize = 500;
const RETENTION_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// One captured log line, as shown by the `logs` console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:5} {}: {}", self.level, self.target, self.message)
    }
}

/// Bounded buffer of recent log entries, shared with the console.
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest once full.
    pub fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| {
                let skip = entries.len().saturating_sub(n);
                entries.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Directory for log files.
///
/// `SKIFF_LOG_DIR` wins; otherwise `<platform data dir>/skiff/logs`, falling
/// back to `./logs`.
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SKIFF_LOG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|data| data.join("skiff").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Delete `skiff.log*` files in `dir` last modified more than `max_age` ago.
/// Returns how many were removed.
fn prune_logs(dir: &Path, max_age: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .map(|modified| modified <= cutoff)
            .unwrap_or(false);
        if stale && std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Tracing layer feeding a [`LogBuffer`].
struct BufferLayer {
    buffer: LogBuffer,
}

impl<S: tracing::Subscriber> Layer<S> for BufferLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        self.buffer.push(LogEntry {
            level: event.metadata().level().into(),
            target: event.metadata().target().to_string(),
            message: fields.into_message(),
        });
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    rest: Vec<String>,
}

impl FieldCollector {
    fn into_message(self) -> String {
        let mut parts: Vec<String> = self.message.into_iter().collect();
        parts.extend(self.rest);
        parts.join(" ")
    }
}

impl tracing::field::Visit for FieldCollector {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.rest.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.rest.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Install the global subscriber and return the console buffer.
///
/// Filter: `SKIFF_LOG`, then `RUST_LOG`, else `info`. Files roll daily in
/// [`log_dir`] and are kept for a week.
pub fn init() -> LogBuffer {
    let buffer = LogBuffer::new(RECENT_CAPACITY);

    let filter = EnvFilter::try_from_env("SKIFF_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let dir = log_dir();
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("warning: cannot create log directory {}: {err}", dir.display());
    }
    prune_logs(&dir, Duration::from_secs(RETENTION_DAYS * 86_400));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(rolling::daily(&dir, LOG_FILE_PREFIX))
        .with_ansi(false)
        .with_target(true);

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(BufferLayer {
            buffer: buffer.clone(),
        })
        .try_init();
    if let Err(err) = result {
        eprintln!("warning: logging already initialised: {err}");
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    static ENV_LOCK: StdMutex<()> = StdMutex::new(());

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            level: LogLevel::Info,
            target: "skiff_core::test".into(),
            message: message.into(),
        }
    }

    #[test]
    fn log_dir_honours_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        let previous = std::env::var("SKIFF_LOG_DIR").ok();

        unsafe { std::env::set_var("SKIFF_LOG_DIR", "/tmp/skiff-test-logs") };
        assert_eq!(log_dir(), PathBuf::from("/tmp/skiff-test-logs"));

        match previous {
            Some(v) => unsafe { std::env::set_var("SKIFF_LOG_DIR", v) },
            None => unsafe { std::env::remove_var("SKIFF_LOG_DIR") },
        }
    }

    #[test]
    fn buffer_evicts_oldest() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.push(entry(&format!("msg {i}")));
        }
        let messages: Vec<_> = buffer.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn recent_returns_newest_in_order() {
        let buffer = LogBuffer::new(10);
        for i in 0..4 {
            buffer.push(entry(&format!("m{i}")));
        }
        let messages: Vec<_> = buffer.recent(2).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["m2", "m3"]);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn entry_display() {
        assert_eq!(
            entry("routing").to_string(),
            "INFO  skiff_core::test: routing"
        );
    }

    #[test]
    fn level_conversion_and_order() {
        assert_eq!(LogLevel::from(&tracing::Level::WARN), LogLevel::Warn);
        assert!(LogLevel::Error > LogLevel::Info);
        assert_eq!(LogLevel::Trace.to_string(), "TRACE");
    }

    #[test]
    fn collector_joins_message_and_fields() {
        let collector = FieldCollector {
            message: Some("routing".into()),
            rest: vec!["path=home".into(), "activations=2".into()],
        };
        assert_eq!(collector.into_message(), "routing path=home activations=2");
        assert_eq!(FieldCollector::default().into_message(), "");
    }

    #[test]
    fn prune_only_touches_log_files() {
        let dir = std::env::temp_dir().join("skiff-test-prune");
        let _ = std::fs::create_dir_all(&dir);
        let old = dir.join("skiff.log.2025-01-01");
        let other = dir.join("notes.txt");
        std::fs::write(&old, "a").unwrap();
        std::fs::write(&other, "b").unwrap();

        assert_eq!(prune_logs(&dir, Duration::ZERO), 1);
        assert!(!old.exists());
        assert!(other.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
