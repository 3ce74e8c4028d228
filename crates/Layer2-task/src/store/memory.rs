//! In-memory task store (non-persistent).

use super::TaskStore;
use crate::task::{TaskId, TaskRecord};
use async_trait::async_trait;
use iotask_foundation::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::with_capacity(64))),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: &TaskRecord) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(Error::AlreadyExists(format!("task {}", task.id)));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn fetch(&self, id: TaskId) -> Result<TaskRecord> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))
    }

    async fn update(&self, task: &TaskRecord) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let slot = tasks
            .get_mut(&task.id)
            .ok_or_else(|| Error::NotFound(format!("task {}", task.id)))?;
        *slot = task.clone();
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.tasks
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
