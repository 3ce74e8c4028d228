//! Service Config
//!
//! Defaults, overlaid by an optional JSON file, overlaid by CLI flags.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name inside the user config directory
pub const SERVICE_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Environment
// ============================================================================

/// Deployment environment, selects the log format and default level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Prod,
}

impl Environment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "dev" => Some(Self::Dev),
            "prod" => Some(Self::Prod),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    /// Default `EnvFilter` directive when RUST_LOG is unset
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Self::Local => "debug",
            Self::Dev | Self::Prod => "info",
        }
    }

    /// Structured JSON logs instead of human-readable lines
    pub fn json_logs(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

// ============================================================================
// Service Config
// ============================================================================

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default)]
    pub env: Environment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `config.json` in the user
    /// config directory is used when present, defaults otherwise. Call
    /// `validate` once overrides have been applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_file(path)?,
            None => match JsonStore::global() {
                Ok(store) => store
                    .load_optional::<ServiceConfig>(SERVICE_CONFIG_FILE)?
                    .unwrap_or_default(),
                Err(e) => {
                    tracing::debug!("No user config directory ({}), using defaults", e);
                    Self::default()
                }
            },
        };
        Ok(config)
    }

    /// Load a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let store = JsonStore::new(dir);

        if !store.exists(filename) {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        store.load(filename)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.address.trim().is_empty() {
            return Err(Error::Config("server.address must not be empty".into()));
        }
        if self.executor.work_duration_ms == 0 {
            return Err(Error::Config(
                "executor.workDurationMs must be greater than zero".into(),
            ));
        }
        // a running task needs its full teardown grace to drain
        if self.server.shutdown_timeout_ms <= self.executor.cancel_grace_ms {
            return Err(Error::Config(format!(
                "server.shutdownTimeoutMs ({}) must exceed executor.cancelGraceMs ({})",
                self.server.shutdown_timeout_ms, self.executor.cancel_grace_ms
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Builder (CLI overrides)
    // ========================================================================

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.server.address = address.into();
        self
    }

    pub fn env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Upper bound for draining in-flight tasks on shutdown
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout_ms: default_request_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

// ============================================================================
// Lifecycle Config
// ============================================================================

/// Task lifecycle timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfig {
    /// Delay between registration and the move to `running`
    #[serde(default = "default_ten_seconds")]
    pub start_delay_ms: u64,

    /// Wait before an active task's record is physically deleted
    #[serde(default = "default_ten_seconds")]
    pub deletion_grace_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: default_ten_seconds(),
            deletion_grace_ms: default_ten_seconds(),
        }
    }
}

impl LifecycleConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn deletion_grace(&self) -> Duration {
        Duration::from_millis(self.deletion_grace_ms)
    }
}

// ============================================================================
// Executor Config
// ============================================================================

/// Simulated work executor timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorConfig {
    #[serde(default = "default_work_duration_ms")]
    pub work_duration_ms: u64,

    /// Random extra work time in `[0, workJitterMs]`
    #[serde(default)]
    pub work_jitter_ms: u64,

    /// Teardown time after cancellation is observed
    #[serde(default = "default_ten_seconds")]
    pub cancel_grace_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            work_duration_ms: default_work_duration_ms(),
            work_jitter_ms: 0,
            cancel_grace_ms: default_ten_seconds(),
        }
    }
}

impl ExecutorConfig {
    pub fn work_duration(&self) -> Duration {
        Duration::from_millis(self.work_duration_ms)
    }

    pub fn work_jitter(&self) -> Duration {
        Duration::from_millis(self.work_jitter_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    4_000
}

fn default_shutdown_timeout_ms() -> u64 {
    15_000
}

fn default_ten_seconds() -> u64 {
    10_000
}

fn default_work_duration_ms() -> u64 {
    60_000
}
