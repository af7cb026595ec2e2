//! Error types for the Formgate service.

use thiserror::Error;

/// Main error type for Formgate operations.
///
/// Rate limit decisions are never errors; they are reported through
/// [`Verdict`](crate::ratelimit::Verdict). This type only covers startup
/// and transport failures.
#[derive(Error, Debug)]
pub enum FormgateError {
    /// Configuration-related errors, including invalid tier definitions
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for FormgateError {
    fn from(err: config::ConfigError) -> Self {
        FormgateError::Config(err.to_string())
    }
}

/// Result type alias for Formgate operations.
pub type Result<T> = std::result::Result<T, FormgateError>;
