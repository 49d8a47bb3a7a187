//! Common error types for the monitor components.

use thiserror::Error;

/// Common errors that can occur across monitor components
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Network transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No signed-in user, or the backend rejected the identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Input rejected locally before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using `MonitorError`
pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Serialization(err.to_string())
    }
}
