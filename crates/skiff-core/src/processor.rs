//! Module activation.
//!
//! An activation makes sure the module's template and dependencies are
//! loaded, then calls the matched handler with the query data. A failed
//! template fetch or dependency batch abandons the activation after logging;
//! it never affects other modules in the same pass.

use std::rc::Rc;

use futures::future::FutureExt;
use futures::task::LocalSpawnExt;

use crate::app::Runtime;
use crate::context::Context;
use crate::deps::{Dependency, PendingBatch, Slot};
use crate::error::SkiffError;
use crate::fragment::Query;
use crate::module::HandlerInput;
use crate::registry::Scope;
use crate::route::RouteTarget;

/// Start activating `target`.
///
/// The activation is polled once in place, so a module whose template and
/// dependencies are already at hand runs its handler before this returns.
/// Otherwise it is parked on the executor.
pub(crate) fn dispatch(runtime: &Rc<Runtime>, target: RouteTarget, query: Query) {
    let module_id = target.module_id.clone();
    let task = {
        let runtime = runtime.clone();
        let module_id = module_id.clone();
        async move {
            if let Err(err) = activate(runtime, target, query).await {
                tracing::error!(module = %module_id, error = %err, "activation abandoned");
            }
        }
    };

    let mut task = Box::pin(task);
    if (&mut task).now_or_never().is_some() {
        return;
    }

    tracing::debug!(module = %module_id, "activation waiting on resources");
    if let Err(err) = runtime.spawner.spawn_local(task) {
        tracing::error!(module = %module_id, error = %err, "could not schedule activation");
    }
}

async fn activate(runtime: Rc<Runtime>, target: RouteTarget, query: Query) -> Result<(), SkiffError> {
    let RouteTarget { module_id, handler } = target;
    ensure_template(&runtime, &module_id).await?;
    bind_dependencies(&runtime, &module_id).await?;
    invoke(&runtime, &module_id, &handler, HandlerInput::Route(query))
}

async fn ensure_template(runtime: &Rc<Runtime>, module_id: &str) -> Result<(), SkiffError> {
    let present = {
        let registry = runtime.registry.borrow();
        let scope = registry
            .get(module_id)
            .ok_or_else(|| SkiffError::UnknownModule(module_id.to_string()))?;
        scope.state.template.is_some()
    };
    if present {
        return Ok(());
    }

    let path = runtime.layout.path_for(module_id);
    let pending = runtime
        .pending_templates
        .borrow_mut()
        .entry(module_id.to_string())
        .or_insert_with(|| runtime.templates.fetch(&path).shared())
        .clone();
    let fetched = pending.clone().await;
    {
        let mut in_flight = runtime.pending_templates.borrow_mut();
        if in_flight.get(module_id).is_some_and(|p| p.ptr_eq(&pending)) {
            in_flight.remove(module_id);
        }
    }
    let Some(text) = fetched.filter(|t| !t.is_empty()) else {
        return Err(SkiffError::TemplateUnavailable {
            module_id: module_id.to_string(),
            path,
        });
    };

    let mut registry = runtime.registry.borrow_mut();
    let scope = registry
        .get_mut(module_id)
        .ok_or_else(|| SkiffError::UnknownModule(module_id.to_string()))?;
    // Another activation may have fetched it meanwhile; keep the first.
    scope.state.template.get_or_insert(text);
    tracing::debug!(module = module_id, path = %path, "template loaded");
    Ok(())
}

async fn bind_dependencies(runtime: &Rc<Runtime>, module_id: &str) -> Result<(), SkiffError> {
    let declared = {
        let registry = runtime.registry.borrow();
        let scope = registry
            .get(module_id)
            .ok_or_else(|| SkiffError::UnknownModule(module_id.to_string()))?;
        scope.state.dependencies().to_vec()
    };
    if declared.is_empty() {
        return Ok(());
    }

    let bound = resolve(runtime, &declared).await?;

    let mut registry = runtime.registry.borrow_mut();
    let scope = registry
        .get_mut(module_id)
        .ok_or_else(|| SkiffError::UnknownModule(module_id.to_string()))?;
    for (local_name, dep) in bound {
        scope.state.resolved.insert(local_name, dep);
    }
    Ok(())
}

struct Waiting {
    local_name: String,
    source_id: String,
    batch: PendingBatch,
    index: usize,
}

/// Resolve `(local name, source id)` declarations through the cache.
///
/// Ready entries bind directly. Entries another activation is loading are
/// awaited. Everything else goes to the loader in a single batch.
async fn resolve(
    runtime: &Rc<Runtime>,
    declared: &[(String, String)],
) -> Result<Vec<(String, Dependency)>, SkiffError> {
    let mut bound = Vec::with_capacity(declared.len());
    let mut waiting = Vec::new();

    {
        let mut cache = runtime.deps.borrow_mut();
        let mut missing: Vec<(String, String)> = Vec::new();
        for (local_name, source_id) in declared {
            match cache.slot(source_id) {
                Some(Slot::Ready(dep)) => bound.push((local_name.clone(), dep)),
                Some(Slot::Loading { batch, index }) => waiting.push(Waiting {
                    local_name: local_name.clone(),
                    source_id: source_id.clone(),
                    batch,
                    index,
                }),
                None => missing.push((local_name.clone(), source_id.clone())),
            }
        }

        if !missing.is_empty() {
            let mut sources: Vec<String> = Vec::new();
            for (_, source_id) in &missing {
                if !sources.contains(source_id) {
                    sources.push(source_id.clone());
                }
            }
            tracing::debug!(?sources, "requesting dependency batch");

            let batch: PendingBatch = runtime
                .loader
                .load(sources.clone())
                .map(|result| result.map(Rc::new))
                .boxed_local()
                .shared();
            for (index, source_id) in sources.iter().enumerate() {
                cache.begin(source_id, batch.clone(), index);
            }
            for (local_name, source_id) in missing {
                let index = sources
                    .iter()
                    .position(|s| *s == source_id)
                    .unwrap_or_default();
                waiting.push(Waiting {
                    local_name,
                    source_id,
                    batch: batch.clone(),
                    index,
                });
            }
        }
    }

    for item in waiting {
        let outcome = item.batch.clone().await;
        let mut cache = runtime.deps.borrow_mut();
        let deps = match outcome {
            Ok(deps) => deps,
            Err(err) => {
                cache.abandon_batch(&item.batch);
                return Err(err);
            }
        };
        let Some(dep) = deps.get(item.index).cloned() else {
            cache.abandon(&item.source_id);
            return Err(SkiffError::dependency(
                &item.source_id,
                "loader returned too few results",
            ));
        };
        let held = cache.complete(&item.source_id, dep);
        bound.push((item.local_name, held));
    }

    Ok(bound)
}

/// Call `handler` on `module_id`.
///
/// Fails with [`SkiffError::Busy`] if another handler currently holds the
/// registry.
pub(crate) fn invoke(
    runtime: &Rc<Runtime>,
    module_id: &str,
    handler: &str,
    input: HandlerInput,
) -> Result<(), SkiffError> {
    let mut registry = runtime
        .registry
        .try_borrow_mut()
        .map_err(|_| SkiffError::Busy(module_id.to_string()))?;
    let scope = registry
        .get_mut(module_id)
        .ok_or_else(|| SkiffError::UnknownModule(module_id.to_string()))?;
    let Scope { state, module } = scope;
    let mut ctx = Context::new(state, runtime);
    tracing::debug!(module = module_id, handler, "invoking handler");
    module.handle(handler, &mut ctx, input)
}
