//! Core error types for `domolib`.

use thiserror::Error;

/// Core error type for `domolib` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Credential data could not be turned into a usable credential.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Unknown log level name.
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
