//! Executor trait

use crate::task::TaskRecord;
use async_trait::async_trait;
use iotask_foundation::Result;
use tokio_util::sync::CancellationToken;

/// Executor trait - implement to add new units of work.
///
/// `cancel` is read-only for the executor. Once it fires the executor tears
/// down and returns `Err(Error::Cancelled)`; any other `Err` marks the task
/// failed.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform the task's work
    async fn execute(&self, task: &TaskRecord, cancel: CancellationToken) -> Result<()>;

    /// Get executor name
    fn name(&self) -> &'static str;
}
