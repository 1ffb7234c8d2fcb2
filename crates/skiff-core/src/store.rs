//! Persisted key/value storage.
//!
//! The native backend is a JSON file. When it cannot be opened the store
//! falls back to a cookie jar whose entries expire after a number of days
//! (30 by default); deletion writes an already-expired cookie.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub const DEFAULT_COOKIE_DAYS: u32 = 30;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Key/value store backed by a JSON file.
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read store at {}", path.display()))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("store at {} is not a JSON object of strings", path.display()))?
            }
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(path, "{}")
                .with_context(|| format!("failed to create store at {}", path.display()))?;
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush();
    }

    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.flush();
        }
    }

    fn flush(&self) {
        let written = serde_json::to_string_pretty(&self.entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs::write(&self.path, json).map_err(anyhow::Error::from));
        if let Err(err) = written {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to persist store");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub expires: SystemTime,
    pub path: String,
}

impl std::fmt::Display for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}={}; expires={}; path={}",
            self.name,
            self.value,
            http_date(self.expires),
            self.path
        )
    }
}

/// In-memory cookie jar used when native storage is unavailable.
pub struct CookieJar {
    cookies: Vec<Cookie>,
    expiry_days: u32,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new(DEFAULT_COOKIE_DAYS)
    }
}

impl CookieJar {
    pub fn new(expiry_days: u32) -> Self {
        Self {
            cookies: Vec::new(),
            expiry_days,
        }
    }

    /// Write a cookie expiring `days` from `now`. Negative days expire it.
    pub fn create_cookie(&mut self, name: &str, value: &str, days: i64, now: SystemTime) {
        let offset = Duration::from_secs(days.unsigned_abs() * SECS_PER_DAY);
        let expires = if days >= 0 {
            now + offset
        } else {
            now.checked_sub(offset).unwrap_or(UNIX_EPOCH)
        };
        let cookie = Cookie {
            name: name.to_string(),
            value: value.to_string(),
            expires,
            path: "/".to_string(),
        };
        tracing::trace!(cookie = %cookie, "set cookie");
        match self.cookies.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
        self.cookies.retain(|c| c.expires > now);
    }

    pub fn read_cookie(&self, name: &str, now: SystemTime) -> Option<String> {
        self.cookies
            .iter()
            .find(|c| c.name == name && c.expires > now)
            .map(|c| c.value.clone())
    }

    /// Live cookies in `name=value; name2=value2` form.
    pub fn header(&self, now: SystemTime) -> String {
        self.cookies
            .iter()
            .filter(|c| c.expires > now)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read_cookie(key, SystemTime::now())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let days = i64::from(self.expiry_days);
        self.create_cookie(key, value, days, SystemTime::now());
    }

    pub fn remove(&mut self, key: &str) {
        self.create_cookie(key, "", -1, SystemTime::now());
    }
}

/// The application's key/value store.
pub enum Store {
    Native(FileStorage),
    Cookie(CookieJar),
}

impl Store {
    /// Open native storage at `path`, falling back to cookies when there is
    /// no path or the file cannot be used.
    pub fn open(path: Option<&Path>, cookie_days: u32) -> Self {
        match path.map(FileStorage::open) {
            Some(Ok(native)) => Self::Native(native),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "native storage unavailable, using cookies");
                Self::Cookie(CookieJar::new(cookie_days))
            }
            None => Self::Cookie(CookieJar::new(cookie_days)),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Self::Native(s) => s.get(key),
            Self::Cookie(jar) => jar.get(key),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self {
            Self::Native(s) => s.set(key, value),
            Self::Cookie(jar) => jar.set(key, value),
        }
    }

    pub fn remove(&mut self, key: &str) {
        match self {
            Self::Native(s) => s.remove(key),
            Self::Cookie(jar) => jar.remove(key),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::Cookie(CookieJar::default())
    }
}

/// Format `t` as an RFC 7231 date, e.g. `Thu, 01 Jan 1970 00:00:00 GMT`.
pub fn http_date(t: SystemTime) -> String {
    DateTime::<Utc>::from(t)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn http_date_formats_known_instants() {
        assert_eq!(http_date(UNIX_EPOCH), "Thu, 01 Jan 1970 00:00:00 GMT");
        assert_eq!(http_date(at(951_782_400)), "Tue, 29 Feb 2000 00:00:00 GMT");
        assert_eq!(http_date(at(1_700_000_000)), "Tue, 14 Nov 2023 22:13:20 GMT");
    }

    #[test]
    fn cookie_expires_after_given_days() {
        let mut jar = CookieJar::default();
        let now = at(1_000_000);
        jar.create_cookie("theme", "dark", 30, now);
        assert_eq!(jar.read_cookie("theme", now).as_deref(), Some("dark"));
        assert_eq!(
            jar.read_cookie("theme", now + Duration::from_secs(29 * SECS_PER_DAY)).as_deref(),
            Some("dark")
        );
        assert_eq!(jar.read_cookie("theme", now + Duration::from_secs(31 * SECS_PER_DAY)), None);
    }

    #[test]
    fn negative_expiry_deletes() {
        let mut jar = CookieJar::default();
        let now = at(1_000_000);
        jar.create_cookie("a", "1", 30, now);
        jar.create_cookie("b", "2", 30, now);
        jar.create_cookie("a", "", -1, now);
        assert_eq!(jar.read_cookie("a", now), None);
        assert_eq!(jar.header(now), "b=2");
    }

    #[test]
    fn cookie_display_has_expiry_and_path() {
        let cookie = Cookie {
            name: "k".into(),
            value: "v".into(),
            expires: UNIX_EPOCH,
            path: "/".into(),
        };
        assert_eq!(cookie.to_string(), "k=v; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/");
    }

    #[test]
    fn store_without_path_uses_cookies() {
        let mut store = Store::open(None, DEFAULT_COOKIE_DAYS);
        assert!(!store.is_native());
        store.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn native_store_persists_across_opens() {
        let dir = std::env::temp_dir().join("skiff-test-store");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("store.json");

        let mut store = Store::open(Some(path.as_path()), DEFAULT_COOKIE_DAYS);
        assert!(store.is_native());
        store.set("visits", "3");
        store.set("gone", "x");
        store.remove("gone");

        let reopened = Store::open(Some(path.as_path()), DEFAULT_COOKIE_DAYS);
        assert_eq!(reopened.get("visits").as_deref(), Some("3"));
        assert_eq!(reopened.get("gone"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_native_store_falls_back() {
        let dir = std::env::temp_dir().join("skiff-test-store-corrupt");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("store.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let store = Store::open(Some(path.as_path()), 7);
        assert!(!store.is_native());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
