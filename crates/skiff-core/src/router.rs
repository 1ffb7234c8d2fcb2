//! Fragment-to-module dispatch decisions.
//!
//! A pass walks the route table in declaration order. The first matching
//! pattern for a module activates it and locks it for the rest of the pass.
//! Clearing happens once, after the walk, for every routed module that was
//! not activated, so the outcome does not depend on pattern order.

use std::collections::HashSet;

use crate::route::{self, RouteTable, RouteTarget};

/// What one navigation pass should do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    /// Modules to activate, in pass order, each with the handler of its
    /// first matching pattern.
    pub activations: Vec<RouteTarget>,
    /// Routed modules that did not match, each listed once, in first-seen
    /// order.
    pub cleared: Vec<String>,
}

/// Decide which modules activate for `path` and which are cleared.
pub fn plan(table: &RouteTable, path: &str) -> RoutePlan {
    let mut locked: HashSet<&str> = HashSet::new();
    let mut seen: Vec<&str> = Vec::new();
    let mut activations = Vec::new();

    for (pattern, targets) in table.iter() {
        let hit = route::matches(pattern, path);
        for target in targets {
            if !seen.contains(&target.module_id.as_str()) {
                seen.push(target.module_id.as_str());
            }
            if hit && locked.insert(target.module_id.as_str()) {
                tracing::debug!(pattern, module = %target.module_id, handler = %target.handler, "route matched");
                activations.push(target.clone());
            }
        }
    }

    let cleared = seen
        .into_iter()
        .filter(|id| !locked.contains(id))
        .map(str::to_string)
        .collect();

    RoutePlan {
        activations,
        cleared,
    }
}
