//! Task storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent)

mod memory;

pub use memory::InMemoryTaskStore;

use crate::task::{TaskId, TaskRecord};
use async_trait::async_trait;
use iotask_foundation::Result;

/// Task store trait - implemented by all storage backends.
///
/// Backends hand out and keep independent copies: mutating a record returned
/// by `fetch` never changes stored state until it is passed to `update`.
/// Every call must be safe to invoke concurrently.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new record. `AlreadyExists` if the id is taken.
    async fn create(&self, task: &TaskRecord) -> Result<()>;

    /// Snapshot of a record. `NotFound` if absent.
    async fn fetch(&self, id: TaskId) -> Result<TaskRecord>;

    /// Replace a record wholesale. `NotFound` if absent.
    async fn update(&self, task: &TaskRecord) -> Result<()>;

    /// Remove a record. `NotFound` if absent.
    async fn delete(&self, id: TaskId) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
