//! Simulated executor - models a long-running I/O bound operation
//!
//! The work is a timed wait raced against the cancellation token. When the
//! token wins, the executor spends `cancel_grace` on teardown before
//! reporting the cancellation.

use crate::executor::Executor;
use crate::task::TaskRecord;
use async_trait::async_trait;
use iotask_foundation::{Error, ExecutorConfig, Result};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    work_duration: Duration,
    work_jitter: Duration,
    cancel_grace: Duration,
}

impl SimulatedExecutor {
    pub fn new(work_duration: Duration, cancel_grace: Duration) -> Self {
        Self {
            work_duration,
            work_jitter: Duration::ZERO,
            cancel_grace,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.work_duration(), config.cancel_grace()).with_jitter(config.work_jitter())
    }

    /// Add up to `jitter` of random extra work per task
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.work_jitter = jitter;
        self
    }

    fn planned_work(&self) -> Duration {
        let jitter_ms = self.work_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.work_duration;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.work_duration + Duration::from_millis(extra)
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(&self, task: &TaskRecord, cancel: CancellationToken) -> Result<()> {
        let work = self.planned_work();
        debug!(task_id = %task.id, ?work, "Simulated work started");

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(task_id = %task.id, grace = ?self.cancel_grace, "Cancellation observed, tearing down");
                tokio::time::sleep(self.cancel_grace).await;
                Err(Error::Cancelled)
            }
            _ = tokio::time::sleep(work) => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_completes_after_work_duration() {
        let executor = SimulatedExecutor::new(Duration::from_millis(50), Duration::from_millis(10));
        let task = TaskRecord::new("build-report");

        let started = Instant::now();
        executor
            .execute(&task, CancellationToken::new())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_cancellation_waits_for_grace() {
        let executor = SimulatedExecutor::new(Duration::from_secs(30), Duration::from_millis(40));
        let task = TaskRecord::new("long-job");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = executor.execute(&task, cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let executor = SimulatedExecutor::new(Duration::from_secs(30), Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .execute(&TaskRecord::new("x"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_jitter_bounds() {
        let executor = SimulatedExecutor::new(Duration::from_millis(100), Duration::ZERO)
            .with_jitter(Duration::from_millis(20));
        for _ in 0..50 {
            let work = executor.planned_work();
            assert!(work >= Duration::from_millis(100));
            assert!(work <= Duration::from_millis(120));
        }
    }
}
