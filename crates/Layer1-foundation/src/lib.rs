//! # iotask-foundation
//!
//! Foundation layer for iotask:
//! - Error: shared error taxonomy and `Result` alias
//! - Config: service configuration (server, lifecycle, executor timings)
//! - Storage: JSON file store used for configuration

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    Environment, ExecutorConfig, LifecycleConfig, ServerConfig, ServiceConfig, SERVICE_CONFIG_FILE,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;
