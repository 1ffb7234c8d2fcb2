//! Resource collaborators: template fetching and dependency loading.
//!
//! Both return futures so real network-backed implementations can suspend.
//! The in-tree implementations complete immediately.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};

use crate::deps::Dependency;
use crate::error::SkiffError;

/// Fetches template text. `None` or an empty string means failure.
pub trait TemplateSource {
    fn fetch(&self, path: &str) -> LocalBoxFuture<'static, Option<String>>;
}

/// A template fetch that several activations can await.
pub(crate) type PendingTemplate = Shared<LocalBoxFuture<'static, Option<String>>>;

/// Resolves a batch of dependency source ids.
///
/// The output lists one dependency per requested id, in request order.
pub trait DependencyLoader {
    fn load(&self, sources: Vec<String>) -> LocalBoxFuture<'static, Result<Vec<Dependency>, SkiffError>>;
}

/// Where templates live: `<dir>/<module-id><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLayout {
    pub dir: String,
    pub suffix: String,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            dir: "templates".to_string(),
            suffix: String::new(),
        }
    }
}

impl TemplateLayout {
    pub fn path_for(&self, module_id: &str) -> String {
        let dir = self.dir.trim_end_matches('/');
        if dir.is_empty() {
            format!("{module_id}{}", self.suffix)
        } else {
            format!("{dir}/{module_id}{}", self.suffix)
        }
    }
}

/// Reads templates from files below `root`.
pub struct FsTemplates {
    root: PathBuf,
}

impl FsTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for FsTemplates {
    fn fetch(&self, path: &str) -> LocalBoxFuture<'static, Option<String>> {
        let full = self.root.join(path);
        let text = match std::fs::read_to_string(&full) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(path = %full.display(), error = %err, "template read failed");
                None
            }
        };
        future::ready(text).boxed_local()
    }
}

/// Templates kept in memory, keyed by fetch path. Records every fetch.
#[derive(Default)]
pub struct MemoryTemplates {
    templates: RefCell<HashMap<String, String>>,
    fetched: RefCell<Vec<String>>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&self, path: &str, text: &str) {
        self.templates
            .borrow_mut()
            .insert(path.to_string(), text.to_string());
    }

    /// Paths requested so far, in request order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl TemplateSource for MemoryTemplates {
    fn fetch(&self, path: &str) -> LocalBoxFuture<'static, Option<String>> {
        self.fetched.borrow_mut().push(path.to_string());
        let text = self.templates.borrow().get(path).cloned();
        future::ready(text).boxed_local()
    }
}

/// Builds one dependency instance.
pub type Factory = Box<dyn Fn() -> Result<Dependency, SkiffError>>;

/// A [`DependencyLoader`] backed by registered factories.
///
/// Unknown source ids fail the whole batch. Each call to a factory is
/// counted so callers can check that caching works.
#[derive(Default)]
pub struct FactoryLoader {
    factories: HashMap<String, Factory>,
    loads: RefCell<HashMap<String, usize>>,
    batches: RefCell<usize>,
}

impl FactoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        source_id: &str,
        factory: impl Fn() -> Result<Dependency, SkiffError> + 'static,
    ) {
        self.factories
            .insert(source_id.to_string(), Box::new(factory));
    }

    pub fn with(
        mut self,
        source_id: &str,
        factory: impl Fn() -> Result<Dependency, SkiffError> + 'static,
    ) -> Self {
        self.register(source_id, factory);
        self
    }

    /// How many times `source_id` has been built.
    pub fn load_count(&self, source_id: &str) -> usize {
        self.loads.borrow().get(source_id).copied().unwrap_or(0)
    }

    /// How many batches have been requested.
    pub fn batch_count(&self) -> usize {
        *self.batches.borrow()
    }

    fn build(&self, source_id: &str) -> Result<Dependency, SkiffError> {
        let factory = self
            .factories
            .get(source_id)
            .ok_or_else(|| SkiffError::dependency(source_id, "no such module"))?;
        *self
            .loads
            .borrow_mut()
            .entry(source_id.to_string())
            .or_insert(0) += 1;
        factory()
    }
}

impl DependencyLoader for FactoryLoader {
    fn load(&self, sources: Vec<String>) -> LocalBoxFuture<'static, Result<Vec<Dependency>, SkiffError>> {
        *self.batches.borrow_mut() += 1;
        tracing::debug!(?sources, "loading dependency batch");
        let result = sources.iter().map(|id| self.build(id)).collect();
        future::ready(result).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::rc::Rc;

    #[test]
    fn layout_builds_paths() {
        assert_eq!(TemplateLayout::default().path_for("modone"), "templates/modone");
        let layout = TemplateLayout {
            dir: "demo/templates/".into(),
            suffix: ".tpl".into(),
        };
        assert_eq!(layout.path_for("modtwo"), "demo/templates/modtwo.tpl");
        let bare = TemplateLayout {
            dir: String::new(),
            suffix: String::new(),
        };
        assert_eq!(bare.path_for("m"), "m");
    }

    #[test]
    fn memory_templates_record_fetches() {
        let templates = MemoryTemplates::new().with("templates/a", "<p>a</p>");
        assert_eq!(block_on(templates.fetch("templates/a")).as_deref(), Some("<p>a</p>"));
        assert_eq!(block_on(templates.fetch("templates/b")), None);
        assert_eq!(templates.fetched(), vec!["templates/a", "templates/b"]);
    }

    #[test]
    fn fs_templates_read_files() {
        let root = std::env::temp_dir().join("skiff-test-fs-templates");
        let _ = std::fs::create_dir_all(root.join("templates"));
        std::fs::write(root.join("templates/one.tpl"), "<h1>{{title}}</h1>").unwrap();

        let source = FsTemplates::new(&root);
        assert_eq!(
            block_on(source.fetch("templates/one.tpl")).as_deref(),
            Some("<h1>{{title}}</h1>")
        );
        assert_eq!(block_on(source.fetch("templates/missing.tpl")), None);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn factory_loader_builds_in_request_order() {
        let loader = FactoryLoader::new()
            .with("utils/a", || Ok(Rc::new(1u8) as Dependency))
            .with("utils/b", || Ok(Rc::new(2u8) as Dependency));

        let deps = block_on(loader.load(vec!["utils/b".into(), "utils/a".into()])).unwrap();
        assert_eq!(deps[0].downcast_ref::<u8>(), Some(&2));
        assert_eq!(deps[1].downcast_ref::<u8>(), Some(&1));
        assert_eq!(loader.load_count("utils/a"), 1);
        assert_eq!(loader.batch_count(), 1);
    }

    #[test]
    fn factory_loader_fails_on_unknown_source() {
        let loader = FactoryLoader::new();
        let err = block_on(loader.load(vec!["utils/ghost".into()])).unwrap_err();
        assert!(matches!(err, SkiffError::DependencyLoad { ref source_id, .. } if source_id == "utils/ghost"));
    }
}
