use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::deps::Dependency;
use crate::document::{Document, MountPoint};
use crate::module::Module;

/// Runtime state of one registered module.
///
/// Declarations are copied out of the module at registration and never
/// change. `template` and `resolved` are filled on first activation.
pub struct ScopeState {
    id: String,
    mount: Option<MountPoint>,
    routes: Vec<(String, String)>,
    events: Vec<(String, String)>,
    dependencies: Vec<(String, String)>,
    pub(crate) template: Option<String>,
    pub(crate) resolved: HashMap<String, Dependency>,
}

impl ScopeState {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mount(&self) -> Option<&MountPoint> {
        self.mount.as_ref()
    }

    pub fn routes(&self) -> &[(String, String)] {
        &self.routes
    }

    pub fn events(&self) -> &[(String, String)] {
        &self.events
    }

    pub fn dependencies(&self) -> &[(String, String)] {
        &self.dependencies
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn resolved(&self, local_name: &str) -> Option<&Dependency> {
        self.resolved.get(local_name)
    }
}

/// A registered module and its state, kept apart so a handler can borrow
/// the state while the module itself is borrowed mutably.
pub struct Scope {
    pub(crate) state: ScopeState,
    pub(crate) module: Box<dyn Module>,
}

impl Scope {
    pub fn state(&self) -> &ScopeState {
        &self.state
    }
}

/// Derive a module id from its registration key: the last `/` segment.
pub fn module_id_from_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Modules in registration order, indexed by id.
#[derive(Default)]
pub struct ModuleRegistry {
    scopes: Vec<Scope>,
    index: HashMap<String, usize>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under `key` and resolve its mount point.
    ///
    /// Returns the derived module id.
    pub fn register(
        &mut self,
        key: &str,
        module: Box<dyn Module>,
        document: &dyn Document,
    ) -> Result<String> {
        let id = module_id_from_key(key).to_string();
        if id.is_empty() {
            bail!("module key {:?} yields an empty id", key);
        }
        if self.index.contains_key(&id) {
            bail!("duplicate module id: {}", id);
        }

        let mount = document.resolve(&id);
        if mount.is_none() {
            tracing::warn!(module = %id, "no mount point in document");
        }

        let state = ScopeState {
            id: id.clone(),
            mount,
            routes: owned_pairs(module.routes()),
            events: owned_pairs(module.events()),
            dependencies: owned_pairs(module.dependencies()),
            template: module.template().map(str::to_string),
            resolved: HashMap::new(),
        };

        self.index.insert(id.clone(), self.scopes.len());
        self.scopes.push(Scope { state, module });
        tracing::debug!(module = %id, key, "registered module");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&Scope> {
        self.index.get(id).map(|&i| &self.scopes[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Scope> {
        self.index.get(id).copied().map(|i| &mut self.scopes[i])
    }

    /// Scopes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.scopes.iter().map(|s| s.state.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
