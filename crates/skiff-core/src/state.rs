use std::time::{Duration, Instant};

use crate::fragment::{ParsedFragment, Query};

/// Navigation state, overwritten by every router pass.
#[derive(Debug, Clone)]
pub struct RouteState {
    pub started_at: Instant,
    /// Path segment of the most recent pass.
    pub path: String,
    /// Query data of the most recent pass.
    pub query: Query,
    /// Fragment currently shown in the location.
    pub location: String,
    /// Every fragment the location has held, oldest first.
    pub history: Vec<String>,
    pub passes: u64,
}

impl Default for RouteState {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            path: String::new(),
            query: Query::new(),
            location: String::new(),
            history: Vec::new(),
            passes: 0,
        }
    }

    pub fn record_pass(&mut self, parsed: &ParsedFragment) {
        self.path = parsed.path.clone();
        self.query = parsed.query.clone();
        self.passes += 1;
    }

    pub fn push_location(&mut self, fragment: &str) {
        self.location = fragment.to_string();
        self.history.push(fragment.to_string());
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::parse;

    #[test]
    fn record_pass_overwrites_previous_route() {
        let mut state = RouteState::new();
        state.record_pass(&parse("#!/one?a=1"));
        state.record_pass(&parse("#!/two"));
        assert_eq!(state.path, "two");
        assert!(state.query.is_empty());
        assert_eq!(state.passes, 2);
    }

    #[test]
    fn history_keeps_every_location() {
        let mut state = RouteState::new();
        state.push_location("#!/one");
        state.push_location("#!/two");
        assert_eq!(state.location, "#!/two");
        assert_eq!(state.history, vec!["#!/one", "#!/two"]);
    }
}
