//! Navigation fragment parsing.
//!
//! Fragments look like `#!/<path>?<k1>=<v1>&<k2>=<v2>`. Nothing is
//! percent-decoded.

use serde_json::{Map, Value};

/// Marker stripped from the front of every fragment.
pub const FRAGMENT_PREFIX: &str = "#!/";

/// Query data carried by a fragment, in first-seen key order.
///
/// A repeated key overwrites the earlier value and keeps its original
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The query as a JSON object of strings, handy for rendering.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .pairs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

/// A fragment split into its path segment and query data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFragment {
    pub path: String,
    pub query: Query,
}

/// Parse a raw fragment.
///
/// The prefix marker is removed once, then the rest is split on the first
/// `?`. Each `&`-separated pair contributes `key → value`, where the value is
/// the text between the first and second `=` (empty when there is no `=`).
/// Empty pairs are skipped.
pub fn parse(fragment: &str) -> ParsedFragment {
    let stripped = fragment.replacen(FRAGMENT_PREFIX, "", 1);
    let (path, raw_query) = match stripped.split_once('?') {
        Some((path, query)) => (path, query),
        None => (stripped.as_str(), ""),
    };

    let mut query = Query::new();
    for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
        let mut bits = pair.split('=');
        let key = bits.next().unwrap_or_default();
        let value = bits.next().unwrap_or_default();
        query.insert(key, value);
    }

    ParsedFragment {
        path: path.to_string(),
        query,
    }
}

/// Build the fragment a `navigate(path)` call records.
pub fn to_fragment(path: &str) -> String {
    format!("{FRAGMENT_PREFIX}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_path_and_query() {
        let parsed = parse("#!/modthree?id=5&flag=yes");
        assert_eq!(parsed.path, "modthree");
        assert_eq!(parsed.query.get("id"), Some("5"));
        assert_eq!(parsed.query.get("flag"), Some("yes"));
        assert_eq!(
            parsed.query.iter().collect::<Vec<_>>(),
            vec![("id", "5"), ("flag", "yes")]
        );
    }

    #[test]
    fn bare_path_has_empty_query() {
        let parsed = parse("#!/home");
        assert_eq!(parsed.path, "home");
        assert!(parsed.query.is_empty());
    }

    #[test]
    fn missing_prefix_is_tolerated() {
        assert_eq!(parse("home").path, "home");
        assert_eq!(parse("").path, "");
    }

    #[test]
    fn duplicate_key_last_wins_in_first_position() {
        let parsed = parse("#!/p?a=1&b=2&a=3");
        assert_eq!(parsed.query.get("a"), Some("3"));
        assert_eq!(
            parsed.query.iter().collect::<Vec<_>>(),
            vec![("a", "3"), ("b", "2")]
        );
    }

    #[test]
    fn no_percent_decoding() {
        let parsed = parse("#!/p?name=a%20b");
        assert_eq!(parsed.query.get("name"), Some("a%20b"));
    }

    #[test]
    fn key_without_value_and_extra_equals() {
        let parsed = parse("#!/p?flag&x=1=2&&");
        assert_eq!(parsed.query.get("flag"), Some(""));
        assert_eq!(parsed.query.get("x"), Some("1"));
        assert_eq!(parsed.query.len(), 2);
    }

    #[test]
    fn only_first_question_mark_splits() {
        let parsed = parse("#!/p?a=1?b=2");
        assert_eq!(parsed.path, "p");
        assert_eq!(parsed.query.get("a"), Some("1?b"));
    }

    #[test]
    fn query_to_json() {
        let parsed = parse("#!/p?id=5");
        assert_eq!(parsed.query.to_json(), json!({"id": "5"}));
    }

    #[test]
    fn to_fragment_adds_prefix() {
        assert_eq!(to_fragment("modone"), "#!/modone");
        assert_eq!(parse(&to_fragment("modone")).path, "modone");
    }
}
