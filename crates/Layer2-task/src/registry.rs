//! Cancellation registry
//!
//! Maps each executing task to the token that stops it. One lock covers
//! every read and write; no storage call ever happens while it is held.

use crate::task::TaskId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct CancellationRegistry {
    handles: Mutex<HashMap<TaskId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: TaskId, token: CancellationToken) {
        self.handles.lock().insert(id, token);
    }

    /// Look up and remove in one step
    pub fn take(&self, id: TaskId) -> Option<CancellationToken> {
        self.handles.lock().remove(&id)
    }

    pub fn remove(&self, id: TaskId) {
        self.handles.lock().remove(&id);
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.handles.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Guard that removes `id` when dropped
    pub fn guard(self: &Arc<Self>, id: TaskId) -> RegistryGuard {
        RegistryGuard {
            registry: Arc::clone(self),
            id,
        }
    }
}

/// Releases a task's registry entry on every exit path of its execution
pub struct RegistryGuard {
    registry: Arc<CancellationRegistry>,
    id: TaskId,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
