//! Work executors
//!
//! - `SimulatedExecutor` - long-running I/O stand-in with cooperative cancellation

pub mod simulated;
pub mod r#trait;

pub use r#trait::Executor;
pub use simulated::SimulatedExecutor;
