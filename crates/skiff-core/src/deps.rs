use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};

use crate::error::SkiffError;

/// A resolved dependency. Every module declaring the same source id holds
/// the same instance.
pub type Dependency = Rc<dyn Any>;

/// Output of one loader batch, shared by everyone waiting on it.
pub type BatchResult = Result<Rc<Vec<Dependency>>, SkiffError>;

/// A loader batch that several activations can await.
pub type PendingBatch = Shared<LocalBoxFuture<'static, BatchResult>>;

/// State of one source id in the cache.
#[derive(Clone)]
pub enum Slot {
    Ready(Dependency),
    /// Requested by an earlier activation; the result will sit at `index`
    /// in the batch output.
    Loading { batch: PendingBatch, index: usize },
}

/// Process-wide map from dependency source id to resolved object.
///
/// Population is first-write-wins: once a source id is ready its instance
/// never changes. Source ids that are being loaded are remembered so a
/// second activation awaits the same batch instead of loading again.
#[derive(Default)]
pub struct DependencyCache {
    slots: HashMap<String, Slot>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, source_id: &str) -> Option<Slot> {
        self.slots.get(source_id).cloned()
    }

    /// The ready instance for `source_id`, if any.
    pub fn get(&self, source_id: &str) -> Option<Dependency> {
        match self.slots.get(source_id) {
            Some(Slot::Ready(dep)) => Some(dep.clone()),
            _ => None,
        }
    }

    pub fn is_ready(&self, source_id: &str) -> bool {
        matches!(self.slots.get(source_id), Some(Slot::Ready(_)))
    }

    /// Mark `source_id` as loading in `batch`, unless it already has a slot.
    pub fn begin(&mut self, source_id: &str, batch: PendingBatch, index: usize) {
        self.slots
            .entry(source_id.to_string())
            .or_insert(Slot::Loading { batch, index });
    }

    /// Store a resolved instance and return the one the cache holds.
    ///
    /// If another instance is already ready it wins and is returned.
    pub fn complete(&mut self, source_id: &str, dep: Dependency) -> Dependency {
        match self.slots.get(source_id) {
            Some(Slot::Ready(existing)) => existing.clone(),
            _ => {
                self.slots
                    .insert(source_id.to_string(), Slot::Ready(dep.clone()));
                dep
            }
        }
    }

    /// Forget a failed load so a later activation can try again.
    pub fn abandon(&mut self, source_id: &str) {
        if matches!(self.slots.get(source_id), Some(Slot::Loading { .. })) {
            self.slots.remove(source_id);
        }
    }

    /// Forget every source id still waiting on `batch`.
    pub fn abandon_batch(&mut self, batch: &PendingBatch) {
        self.slots.retain(|_, slot| match slot {
            Slot::Loading { batch: pending, .. } => !pending.ptr_eq(batch),
            Slot::Ready(_) => true,
        });
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ready source ids, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
