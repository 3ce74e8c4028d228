//! Task Manager - task lifecycle orchestration
//!
//! Features:
//! - Registration with immediate, detached execution
//! - Status reads with live duration for running tasks
//! - Cooperative cancellation through per-task tokens
//! - Deferred deletion of active tasks
//! - Supervised background work, drained on shutdown
//!
//! Terminal state has a single writer: the task's own execution sequence.
//! `cancel` only signals the token; the sequence observes it (during the
//! pre-start delay or inside the executor) and commits `cancelled` itself.

use crate::executor::Executor;
use crate::registry::CancellationRegistry;
use crate::state::TaskStatus;
use crate::store::TaskStore;
use crate::task::{TaskId, TaskRecord};
use chrono::Utc;
use iotask_foundation::{Error, LifecycleConfig, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Configuration for task manager
#[derive(Debug, Clone)]
pub struct TaskManagerConfig {
    /// Delay between registration and the move to running
    pub start_delay: Duration,

    /// Wait before an active task's record is physically deleted
    pub deletion_grace: Duration,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}

impl TaskManagerConfig {
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            start_delay: config.start_delay(),
            deletion_grace: config.deletion_grace(),
        }
    }
}

/// How a delete request was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// Terminal task, removed before returning
    Immediate,

    /// Active task, cancelled and removed once the grace delay passes
    Scheduled { after: Duration },
}

/// Task Manager - handles task lifecycle and execution
#[derive(Clone)]
pub struct TaskManager {
    /// Record persistence
    store: Arc<dyn TaskStore>,

    /// Unit of work
    executor: Arc<dyn Executor>,

    /// Tokens of executing tasks
    registry: Arc<CancellationRegistry>,

    /// Execution sequences and delayed deletions
    tracker: TaskTracker,

    /// Parent of every task token
    shutdown: CancellationToken,

    /// Orders tracker spawns against shutdown's cancel-and-close
    spawn_gate: Arc<Mutex<()>>,

    /// Configuration
    config: Arc<TaskManagerConfig>,
}

impl TaskManager {
    /// Create a new task manager
    pub fn new(
        store: Arc<dyn TaskStore>,
        executor: Arc<dyn Executor>,
        config: TaskManagerConfig,
    ) -> Self {
        debug!(
            store = store.name(),
            executor = executor.name(),
            "Creating task manager"
        );
        Self {
            store,
            executor,
            registry: Arc::new(CancellationRegistry::new()),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            spawn_gate: Arc::new(Mutex::new(())),
            config: Arc::new(config),
        }
    }

    /// Register a task and start executing it in the background.
    ///
    /// Returns as soon as the pending record is persisted.
    pub async fn register(&self, name: impl Into<String>) -> Result<TaskId> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let task = TaskRecord::new(name);
        let task_id = task.id;
        self.store.create(&task).await?;

        // Registered before spawning so the task is cancellable right away
        let cancel = self.shutdown.child_token();
        self.registry.insert(task_id, cancel.clone());

        let name = task.name.clone();
        let manager = self.clone();
        if !self.spawn_tracked(async move { manager.run_sequence(task, cancel).await }) {
            // shutdown began while the record was being created
            self.registry.remove(task_id);
            if let Err(e) = self.store.delete(task_id).await {
                debug!(task_id = %task_id, error = %e, "Rejected task already gone");
            }
            return Err(Error::ShuttingDown);
        }

        info!(task_id = %task_id, name = %name, "Registered task");
        Ok(task_id)
    }

    /// Get a task, with duration computed up to now while it is running
    pub async fn get(&self, task_id: TaskId) -> Result<TaskRecord> {
        let mut task = self.store.fetch(task_id).await?;
        if task.status.is_running() && task.started_at.is_some() {
            task.duration = task.duration_at(Utc::now());
        }
        Ok(task)
    }

    /// Signal a task to stop.
    ///
    /// Returns whether a live execution was signalled. A task that already
    /// finished (or was already signalled) is a no-op success.
    pub async fn cancel(&self, task_id: TaskId) -> Result<bool> {
        self.store.fetch(task_id).await?;

        match self.registry.take(task_id) {
            Some(token) => {
                token.cancel();
                info!(task_id = %task_id, "Cancellation requested");
                Ok(true)
            }
            None => {
                debug!(task_id = %task_id, "Cancel ignored, task not executing");
                Ok(false)
            }
        }
    }

    /// Delete a task.
    ///
    /// Terminal tasks are removed immediately. Active tasks are cancelled and
    /// removed after the deletion grace delay; that delayed removal is best
    /// effort and its failure is only logged.
    pub async fn delete(&self, task_id: TaskId) -> Result<Deletion> {
        let task = self.store.fetch(task_id).await?;

        if task.is_terminal() {
            self.store.delete(task_id).await?;
            info!(task_id = %task_id, "Deleted task");
            return Ok(Deletion::Immediate);
        }

        self.cancel(task_id).await?;

        let grace = self.config.deletion_grace;
        let store = Arc::clone(&self.store);
        let shutdown = self.shutdown.clone();
        let scheduled = self.spawn_tracked(async move {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {}
                _ = shutdown.cancelled() => {}
            }
            match store.delete(task_id).await {
                Ok(()) => info!(task_id = %task_id, "Deleted task after grace delay"),
                Err(e) => debug!(task_id = %task_id, error = %e, "Delayed delete skipped"),
            }
        });
        if !scheduled {
            // draining already: delayed deletes fire immediately
            self.store.delete(task_id).await?;
            info!(task_id = %task_id, "Deleted task during shutdown");
            return Ok(Deletion::Immediate);
        }

        info!(task_id = %task_id, ?grace, "Scheduled deletion of active task");
        Ok(Deletion::Scheduled { after: grace })
    }

    /// Poll until the task reaches a terminal state
    pub async fn wait(&self, task_id: TaskId) -> Result<TaskRecord> {
        loop {
            let task = self.get(task_id).await?;
            if task.is_terminal() {
                return Ok(task);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Whether the task currently holds a cancellation handle
    pub fn is_executing(&self, task_id: TaskId) -> bool {
        self.registry.contains(task_id)
    }

    /// Number of tasks holding a cancellation handle
    pub fn executing_count(&self) -> usize {
        self.registry.len()
    }

    /// Tracked background work (execution sequences and pending deletions)
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop accepting tasks, cancel everything in flight and wait for the
    /// background work to drain.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        info!(in_flight = self.tracker.len(), "Shutting down task manager");
        {
            let _gate = self.spawn_gate.lock();
            self.shutdown.cancel();
            self.tracker.close();
        }

        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} background tasks still running after {:?}",
                    self.tracker.len(),
                    timeout
                ))
            })?;

        if !self.registry.is_empty() {
            warn!(
                remaining = self.registry.len(),
                "Cancellation handles left after drain"
            );
        }
        info!("Task manager drained");
        Ok(())
    }

    /// Spawn into the tracker unless shutdown has begun. Returns whether the
    /// future was spawned.
    fn spawn_tracked<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let _gate = self.spawn_gate.lock();
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.tracker.spawn(future);
        true
    }

    // ========== Execution sequence ==========

    async fn run_sequence(self, mut task: TaskRecord, cancel: CancellationToken) {
        let task_id = task.id;
        let _registration = self.registry.guard(task_id);

        let cancelled_before_start = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.config.start_delay) => false,
        };
        if cancelled_before_start {
            debug!(task_id = %task_id, "Cancelled before start");
            self.commit_terminal(task_id, TaskStatus::Cancelled).await;
            return;
        }

        if let Err(e) = task.start(Utc::now()) {
            warn!(task_id = %task_id, error = %e, "Cannot start task");
            return;
        }
        if let Err(e) = self.store.update(&task).await {
            warn!(task_id = %task_id, error = %e, "Failed to persist running state, abandoning");
            return;
        }
        info!(task_id = %task_id, executor = self.executor.name(), "Task running");

        let status = match self.executor.execute(&task, cancel.clone()).await {
            Ok(()) => TaskStatus::Completed,
            Err(Error::Cancelled) => TaskStatus::Cancelled,
            Err(_) if cancel.is_cancelled() => TaskStatus::Cancelled,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Task execution failed");
                TaskStatus::Failed
            }
        };

        self.commit_terminal(task_id, status).await;
    }

    /// Re-read the record and write its terminal state. Failures end the
    /// sequence without retry.
    async fn commit_terminal(&self, task_id: TaskId, status: TaskStatus) {
        let mut current = match self.store.fetch(task_id).await {
            Ok(task) => task,
            Err(e) if e.is_not_found() => {
                debug!(task_id = %task_id, "Task deleted before its final state was written");
                return;
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Failed to reload task");
                return;
            }
        };

        if let Err(e) = current.finish(status, Utc::now()) {
            warn!(task_id = %task_id, error = %e, "Skipping terminal write");
            return;
        }

        match self.store.update(&current).await {
            Ok(()) => info!(
                task_id = %task_id,
                status = %status,
                duration = ?current.duration,
                "Task finished"
            ),
            Err(e) => warn!(task_id = %task_id, error = %e, "Failed to persist final state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SimulatedExecutor;
    use crate::store::InMemoryTaskStore;
    use async_trait::async_trait;
    use iotask_foundation::ServiceConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    fn fast_config() -> TaskManagerConfig {
        TaskManagerConfig {
            start_delay: Duration::from_millis(30),
            deletion_grace: Duration::from_millis(100),
        }
    }

    fn manager_with(executor: Arc<dyn Executor>, store: Arc<dyn TaskStore>) -> TaskManager {
        TaskManager::new(store, executor, fast_config())
    }

    fn simulated(work_ms: u64) -> Arc<dyn Executor> {
        Arc::new(SimulatedExecutor::new(
            Duration::from_millis(work_ms),
            Duration::from_millis(20),
        ))
    }

    struct FailingExecutor;

    #[async_trait]
    impl Executor for FailingExecutor {
        async fn execute(&self, _task: &TaskRecord, _cancel: CancellationToken) -> Result<()> {
            Err(Error::Execution("disk unreachable".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Memory store whose writes can be switched off or held
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryTaskStore,
        fail_creates: AtomicBool,
        fail_updates: AtomicBool,
        hold_creates: AtomicBool,
        create_gate: Notify,
    }

    #[async_trait]
    impl TaskStore for FlakyStore {
        async fn create(&self, task: &TaskRecord) -> Result<()> {
            if self.fail_creates.load(Ordering::SeqCst) {
                return Err(Error::Storage("create rejected".into()));
            }
            if self.hold_creates.load(Ordering::SeqCst) {
                self.create_gate.notified().await;
            }
            self.inner.create(task).await
        }

        async fn fetch(&self, id: TaskId) -> Result<TaskRecord> {
            self.inner.fetch(id).await
        }

        async fn update(&self, task: &TaskRecord) -> Result<()> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(Error::Storage("update rejected".into()));
            }
            self.inner.update(task).await
        }

        async fn delete(&self, id: TaskId) -> Result<()> {
            self.inner.delete(id).await
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_register_returns_pending_task() {
        let manager = manager_with(simulated(500), Arc::new(InMemoryTaskStore::new()));

        let task_id = manager.register("build-report").await.unwrap();
        let task = manager.get(task_id).await.unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.name, "build-report");
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
        assert!(manager.is_executing(task_id));
    }

    #[tokio::test]
    async fn test_executor_error_marks_failed() {
        let manager = manager_with(Arc::new(FailingExecutor), Arc::new(InMemoryTaskStore::new()));

        let task_id = manager.register("doomed").await.unwrap();
        let task = tokio::time::timeout(Duration::from_secs(2), manager.wait(task_id))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.started_at.is_some());
        assert!(task.completed_at >= task.started_at);
        assert!(!manager.is_executing(task_id));
    }

    #[tokio::test]
    async fn test_running_persist_failure_releases_handle() {
        let store = Arc::new(FlakyStore::default());
        store.fail_updates.store(true, Ordering::SeqCst);
        let manager = manager_with(simulated(50), store.clone());

        let task_id = manager.register("orphan").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!manager.is_executing(task_id));
        assert_eq!(manager.executing_count(), 0);
        // sequence abandoned: record never left pending
        let task = manager.get(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_failure_propagates_without_leak() {
        let store = Arc::new(FlakyStore::default());
        store.fail_creates.store(true, Ordering::SeqCst);
        let manager = manager_with(simulated(50), store);

        let err = manager.register("rejected").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(manager.executing_count(), 0);
        assert_eq!(manager.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let manager = manager_with(simulated(50), Arc::new(InMemoryTaskStore::new()));
        let ghost = TaskId::new();

        assert!(manager.get(ghost).await.unwrap_err().is_not_found());
        assert!(manager.cancel(ghost).await.unwrap_err().is_not_found());
        assert!(manager.delete(ghost).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_cancel_finished_task_is_noop() {
        let manager = manager_with(simulated(10), Arc::new(InMemoryTaskStore::new()));

        let task_id = manager.register("quick").await.unwrap();
        let done = manager.wait(task_id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        assert!(!manager.cancel(task_id).await.unwrap());
        let after = manager.get(task_id).await.unwrap();
        assert_eq!(after, done);
    }

    #[tokio::test]
    async fn test_register_after_shutdown_rejected() {
        let manager = manager_with(simulated(10), Arc::new(InMemoryTaskStore::new()));
        manager.shutdown(Duration::from_secs(1)).await.unwrap();

        assert!(manager.is_shutting_down());
        let err = manager.register("late").await.unwrap_err();
        assert!(matches!(err, Error::ShuttingDown));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_drains() {
        let manager = manager_with(simulated(60_000), Arc::new(InMemoryTaskStore::new()));

        let running = manager.register("running-at-shutdown").await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(manager.get(running).await.unwrap().status, TaskStatus::Running);
        let pending = manager.register("pending-at-shutdown").await.unwrap();

        manager.shutdown(Duration::from_secs(2)).await.unwrap();

        assert_eq!(manager.in_flight(), 0);
        assert_eq!(manager.executing_count(), 0);
        let never_started = manager.get(pending).await.unwrap();
        assert!(never_started.started_at.is_none());
        for id in [pending, running] {
            assert_eq!(manager.get(id).await.unwrap().status, TaskStatus::Cancelled);
        }
    }

    #[tokio::test]
    async fn test_shutdown_timeout() {
        let executor = Arc::new(SimulatedExecutor::new(
            Duration::from_secs(60),
            Duration::from_secs(5),
        ));
        let manager = manager_with(executor, Arc::new(InMemoryTaskStore::new()));
        manager.register("slow-teardown").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let err = manager
            .shutdown(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_get_does_not_mutate_stored_duration() {
        let store = Arc::new(InMemoryTaskStore::new());
        let manager = manager_with(simulated(1_000), store.clone());

        let task_id = manager.register("measured").await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        let viewed = manager.get(task_id).await.unwrap();
        assert_eq!(viewed.status, TaskStatus::Running);
        assert!(viewed.duration > Duration::ZERO);

        let stored = store.fetch(task_id).await.unwrap();
        assert_eq!(stored.duration, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_terminal_persist_failure_releases_handle() {
        let store = Arc::new(FlakyStore::default());
        let manager = manager_with(simulated(150), store.clone());

        let task_id = manager.register("unrecorded-finish").await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(manager.get(task_id).await.unwrap().status, TaskStatus::Running);

        store.fail_updates.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;

        // the write is not retried; the record keeps its last persisted state
        let task = store.fetch(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.completed_at.is_none());
        assert!(!manager.is_executing(task_id));
        assert_eq!(manager.executing_count(), 0);
        assert_eq!(manager.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_register_racing_shutdown_is_rejected() {
        let store = Arc::new(FlakyStore::default());
        store.hold_creates.store(true, Ordering::SeqCst);
        let manager = manager_with(simulated(60_000), store.clone());

        let registering = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.register("straggler").await })
        };
        // let register pass its shutdown check and block inside create
        tokio::time::sleep(Duration::from_millis(30)).await;

        manager.shutdown(Duration::from_secs(1)).await.unwrap();
        store.create_gate.notify_one();

        let err = registering.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ShuttingDown));
        assert_eq!(manager.in_flight(), 0);
        assert_eq!(manager.executing_count(), 0);
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_default_timings_drain_within_shutdown_timeout() {
        // defaults scaled down 100x keep their ratios
        let defaults = ServiceConfig::default();
        let scaled = |ms: u64| Duration::from_millis(ms / 100);

        let config = TaskManagerConfig {
            start_delay: scaled(defaults.lifecycle.start_delay_ms),
            deletion_grace: scaled(defaults.lifecycle.deletion_grace_ms),
        };
        let executor = Arc::new(SimulatedExecutor::new(
            scaled(defaults.executor.work_duration_ms),
            scaled(defaults.executor.cancel_grace_ms),
        ));
        let manager = TaskManager::new(Arc::new(InMemoryTaskStore::new()), executor, config);

        let task_id = manager.register("mid-flight").await.unwrap();
        let running = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let task = manager.get(task_id).await.unwrap();
                if task.status == TaskStatus::Running {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(running.is_ok(), "task never reached running");

        manager
            .shutdown(scaled(defaults.server.shutdown_timeout_ms))
            .await
            .unwrap();
        assert_eq!(manager.get(task_id).await.unwrap().status, TaskStatus::Cancelled);
        assert!(manager.registry.is_empty());
    }
}
