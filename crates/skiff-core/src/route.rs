use std::collections::HashMap;

use crate::registry::ModuleRegistry;

/// Route pattern that matches every path.
pub const WILDCARD: &str = "*";

/// One `(module, handler)` pair a pattern dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub module_id: String,
    pub handler: String,
}

/// Merged route declarations of every module.
///
/// Patterns iterate in the order they were first declared (registration
/// order, then declaration order within a module). A pattern may fan out to
/// several modules; nothing is ever overwritten.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<(String, Vec<RouteTarget>)>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the route maps of every registered module.
    pub fn build(registry: &ModuleRegistry) -> Self {
        let mut table = Self::new();
        for scope in registry.iter() {
            let state = scope.state();
            for (pattern, handler) in state.routes() {
                table.insert(
                    pattern,
                    RouteTarget {
                        module_id: state.id().to_string(),
                        handler: handler.clone(),
                    },
                );
            }
        }
        tracing::debug!(patterns = table.len(), "route table built");
        table
    }

    pub fn insert(&mut self, pattern: &str, target: RouteTarget) {
        match self.index.get(pattern) {
            Some(&i) => self.entries[i].1.push(target),
            None => {
                self.index.insert(pattern.to_string(), self.entries.len());
                self.entries.push((pattern.to_string(), vec![target]));
            }
        }
    }

    pub fn get(&self, pattern: &str) -> Option<&[RouteTarget]> {
        self.index.get(pattern).map(|&i| self.entries[i].1.as_slice())
    }

    /// `(pattern, targets)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RouteTarget])> {
        self.entries
            .iter()
            .map(|(pattern, targets)| (pattern.as_str(), targets.as_slice()))
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `pattern` matches the parsed `path`.
pub fn matches(pattern: &str, path: &str) -> bool {
    pattern == WILDCARD || pattern == path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::document::MemoryDocument;
    use crate::error::SkiffError;
    use crate::module::{HandlerInput, Module};

    struct Routes(&'static [(&'static str, &'static str)]);

    impl Module for Routes {
        fn routes(&self) -> &[(&str, &str)] {
            self.0
        }
        fn handle(&mut self, h: &str, ctx: &mut Context<'_>, _: HandlerInput) -> Result<(), SkiffError> {
            Err(SkiffError::unknown_handler(ctx.module_id(), h))
        }
    }

    fn target(module_id: &str, handler: &str) -> RouteTarget {
        RouteTarget {
            module_id: module_id.into(),
            handler: handler.into(),
        }
    }

    #[test]
    fn overlapping_patterns_fan_out() {
        let doc = MemoryDocument::new();
        let mut reg = ModuleRegistry::new();
        reg.register("a", Box::new(Routes(&[("home", "show")])), &doc).unwrap();
        reg.register("b", Box::new(Routes(&[("home", "log"), ("about", "info")])), &doc)
            .unwrap();

        let table = RouteTable::build(&reg);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("home").unwrap(),
            &[target("a", "show"), target("b", "log")]
        );
        assert_eq!(table.get("about").unwrap(), &[target("b", "info")]);
    }

    #[test]
    fn iteration_follows_first_declaration() {
        let doc = MemoryDocument::new();
        let mut reg = ModuleRegistry::new();
        reg.register("a", Box::new(Routes(&[("x", "1"), ("*", "2")])), &doc).unwrap();
        reg.register("b", Box::new(Routes(&[("y", "3"), ("x", "4")])), &doc).unwrap();

        let table = RouteTable::build(&reg);
        let patterns: Vec<_> = table.iter().map(|(p, _)| p).collect();
        assert_eq!(patterns, vec!["x", "*", "y"]);
    }

    #[test]
    fn module_without_routes_contributes_nothing() {
        let doc = MemoryDocument::new();
        let mut reg = ModuleRegistry::new();
        reg.register("quiet", Box::new(Routes(&[])), &doc).unwrap();
        assert!(RouteTable::build(&reg).is_empty());
    }

    #[test]
    fn wildcard_matches_everything() {
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
        assert!(matches("home", "home"));
        assert!(!matches("home", "homes"));
    }
}
