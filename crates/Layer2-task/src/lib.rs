//! # iotask-task
//!
//! Task lifecycle management for iotask.
//! Registers tasks, runs them in the background and tracks their state
//! through pluggable storage and executors.
//!
//! ## Features
//!
//! - Task registration with detached execution
//! - Status reads with live duration
//! - Cooperative cancellation
//! - Deferred deletion of active tasks
//! - Supervised shutdown

pub mod executor;
pub mod manager;
pub mod registry;
pub mod state;
pub mod store;
pub mod task;

pub use executor::{Executor, SimulatedExecutor};
pub use manager::{Deletion, TaskManager, TaskManagerConfig};
pub use registry::CancellationRegistry;
pub use state::TaskStatus;
pub use store::{InMemoryTaskStore, TaskStore};
pub use task::{TaskId, TaskRecord};
