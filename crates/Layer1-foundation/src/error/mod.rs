//! Error types for iotask
//!
//! Every layer reports failures through this one enum so that the routing
//! layer can map them onto transport responses in a single place.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// iotask error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Task lookup
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ========================================================================
    // Lifecycle
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Shutting down")]
    ShuttingDown,

    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // Input / configuration
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the referenced record is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether the message may be shown to an API caller as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::AlreadyExists(_)
                | Error::InvalidInput(_)
                | Error::ShuttingDown
        )
    }
}
