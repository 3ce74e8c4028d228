//! Config - service settings
//!
//! - `service.rs` - ServiceConfig (server, lifecycle, executor timings)

mod service;

pub use service::{
    Environment, ExecutorConfig, LifecycleConfig, ServerConfig, ServiceConfig, SERVICE_CONFIG_FILE,
};
