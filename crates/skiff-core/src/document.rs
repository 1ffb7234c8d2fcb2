use std::cell::RefCell;
use std::collections::BTreeMap;

/// Handle to a module's mount point, resolved once at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountPoint(String);

impl MountPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// A delegated event binding: `event_type` on `selector` inside a mount
/// calls `handler` on `module_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub event_type: String,
    pub selector: String,
    pub module_id: String,
    pub handler: String,
}

/// The document tree modules render into.
///
/// Replacing a mount's contents drops the bindings made against its old
/// contents.
pub trait Document {
    /// Look up the mount point for `id`, if the document has one.
    fn resolve(&self, id: &str) -> Option<MountPoint>;

    fn set_content(&self, mount: &MountPoint, html: &str);

    fn content(&self, mount: &MountPoint) -> Option<String>;

    fn bind(&self, mount: &MountPoint, binding: Binding);

    /// Bindings on `mount` for this event type and selector, in bind order.
    fn bindings(&self, mount: &MountPoint, event_type: &str, selector: &str) -> Vec<Binding>;
}

#[derive(Default)]
struct MountState {
    html: String,
    bindings: Vec<Binding>,
}

/// In-memory [`Document`].
///
/// In open mode every id resolves (a mount is created on demand). In strict
/// mode only ids passed to [`with_mounts`](MemoryDocument::with_mounts) or
/// [`add_mount`](MemoryDocument::add_mount) resolve.
#[derive(Default)]
pub struct MemoryDocument {
    mounts: RefCell<BTreeMap<String, MountState>>,
    strict: bool,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mounts<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let doc = Self {
            mounts: RefCell::new(BTreeMap::new()),
            strict: true,
        };
        for id in ids {
            doc.add_mount(id);
        }
        doc
    }

    pub fn add_mount(&self, id: impl Into<String>) {
        self.mounts.borrow_mut().entry(id.into()).or_default();
    }

    /// Mount ids in sorted order.
    pub fn mount_ids(&self) -> Vec<String> {
        self.mounts.borrow().keys().cloned().collect()
    }

    pub fn binding_count(&self, mount: &MountPoint) -> usize {
        self.mounts
            .borrow()
            .get(mount.id())
            .map_or(0, |m| m.bindings.len())
    }
}

impl Document for MemoryDocument {
    fn resolve(&self, id: &str) -> Option<MountPoint> {
        if !self.strict {
            self.add_mount(id);
        }
        self.mounts
            .borrow()
            .contains_key(id)
            .then(|| MountPoint::new(id))
    }

    fn set_content(&self, mount: &MountPoint, html: &str) {
        let mut mounts = self.mounts.borrow_mut();
        let state = mounts.entry(mount.id().to_string()).or_default();
        state.html = html.to_string();
        state.bindings.clear();
    }

    fn content(&self, mount: &MountPoint) -> Option<String> {
        self.mounts.borrow().get(mount.id()).map(|m| m.html.clone())
    }

    fn bind(&self, mount: &MountPoint, binding: Binding) {
        self.mounts
            .borrow_mut()
            .entry(mount.id().to_string())
            .or_default()
            .bindings
            .push(binding);
    }

    fn bindings(&self, mount: &MountPoint, event_type: &str, selector: &str) -> Vec<Binding> {
        self.mounts
            .borrow()
            .get(mount.id())
            .map(|m| {
                m.bindings
                    .iter()
                    .filter(|b| b.event_type == event_type && b.selector == selector)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(selector: &str, handler: &str) -> Binding {
        Binding {
            event_type: "click".into(),
            selector: selector.into(),
            module_id: "m".into(),
            handler: handler.into(),
        }
    }

    #[test]
    fn open_document_resolves_any_id() {
        let doc = MemoryDocument::new();
        let mount = doc.resolve("anything").unwrap();
        assert_eq!(mount.id(), "anything");
        assert_eq!(doc.content(&mount).as_deref(), Some(""));
    }

    #[test]
    fn strict_document_only_resolves_known_mounts() {
        let doc = MemoryDocument::with_mounts(["a", "b"]);
        assert!(doc.resolve("a").is_some());
        assert!(doc.resolve("zzz").is_none());
        assert_eq!(doc.mount_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn set_content_replaces_html_and_drops_bindings() {
        let doc = MemoryDocument::new();
        let mount = doc.resolve("m").unwrap();
        doc.set_content(&mount, "<p>one</p>");
        doc.bind(&mount, click(".one", "go_one"));
        assert_eq!(doc.binding_count(&mount), 1);

        doc.set_content(&mount, "");
        assert_eq!(doc.content(&mount).as_deref(), Some(""));
        assert_eq!(doc.binding_count(&mount), 0);
    }

    #[test]
    fn bindings_filter_by_event_and_selector() {
        let doc = MemoryDocument::new();
        let mount = doc.resolve("m").unwrap();
        doc.bind(&mount, click(".one", "go_one"));
        doc.bind(&mount, click(".two", "go_two"));
        doc.bind(&mount, click(".one", "also_one"));

        let hits = doc.bindings(&mount, "click", ".one");
        let handlers: Vec<_> = hits.iter().map(|b| b.handler.as_str()).collect();
        assert_eq!(handlers, vec!["go_one", "also_one"]);
        assert!(doc.bindings(&mount, "submit", ".one").is_empty());
    }
}
