//! Task record and identifier

use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use iotask_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| Error::InvalidInput(format!("invalid task id: {}", s)))
    }
}

/// Persisted state of one unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique task identifier
    pub id: TaskId,

    /// Caller-supplied label
    pub name: String,

    /// Current state
    pub status: TaskStatus,

    /// When the task was registered
    pub created_at: DateTime<Utc>,

    /// When execution began
    pub started_at: Option<DateTime<Utc>>,

    /// When the first terminal transition happened
    pub completed_at: Option<DateTime<Utc>>,

    /// Authoritative once terminal; filled on read while running
    #[serde(default)]
    pub duration: Duration,
}

impl TaskRecord {
    /// Create a pending task
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration: Duration::ZERO,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark task as running
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.check_transition(TaskStatus::Running)?;
        self.status = TaskStatus::Running;
        self.started_at = Some(at);
        Ok(())
    }

    /// Move into a terminal state, stamping `completed_at` and `duration`
    pub fn finish(&mut self, status: TaskStatus, at: DateTime<Utc>) -> Result<()> {
        if !status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "{} is not a terminal state",
                status
            )));
        }
        self.check_transition(status)?;
        self.status = status;
        self.completed_at = Some(at);
        self.duration = self.duration_at(at);
        Ok(())
    }

    /// Duration as observed at `now`.
    ///
    /// Running tasks measure from `started_at` to `now`; finished tasks from
    /// `started_at` to `completed_at`. Tasks that never started report zero.
    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let end = match self.status {
            TaskStatus::Running => now,
            _ => self.completed_at.unwrap_or(now),
        };
        (end - start).to_std().unwrap_or_default()
    }

    fn check_transition(&self, next: TaskStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition(format!(
                "task {}: {} -> {}",
                self.id, self.status, next
            )))
        }
    }
}
