//! Request and response bodies

use chrono::{DateTime, Utc};
use iotask_task::{TaskId, TaskRecord, TaskStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[serde(default)]
    #[validate(length(
        min = 3,
        max = 100,
        message = "name is required and must be between 3 and 100 characters"
    ))]
    pub name: String,
}

/// Short acknowledgement for create, delete and cancel
#[derive(Debug, Serialize)]
pub struct TaskAck {
    pub id: TaskId,
    pub status: &'static str,
}

impl TaskAck {
    pub fn new(id: TaskId, status: &'static str) -> Self {
        Self { id, status }
    }
}

/// Full task view returned by `GET /tasks/{id}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub duration_ms: u64,
}

impl From<TaskRecord> for TaskView {
    fn from(task: TaskRecord) -> Self {
        let duration = (!task.duration.is_zero()).then(|| format_duration(task.duration));
        Self {
            id: task.id,
            name: task.name,
            status: task.status,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            duration,
            duration_ms: task.duration.as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub in_flight: usize,
}

/// Render as `850ms`, `12.345s` or `2m5.100s`
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis < 1_000 {
        return format!("{}ms", millis);
    }
    let minutes = millis / 60_000;
    let rest = (millis % 60_000) as f64 / 1_000.0;
    if minutes == 0 {
        format!("{:.3}s", rest)
    } else {
        format!("{}m{:.3}s", minutes, rest)
    }
}
