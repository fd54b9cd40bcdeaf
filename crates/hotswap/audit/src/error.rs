//! Audit error types

use thiserror::Error;

/// Errors raised by audit sinks
#[derive(Debug, Error)]
pub enum AuditError {
    /// Underlying file I/O failed
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be encoded or decoded
    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink refused the entry
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
