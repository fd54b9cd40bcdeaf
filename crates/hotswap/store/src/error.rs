//! Store error types

use hotswap_types::{JobId, SubjectId};
use thiserror::Error;

/// Errors raised by approval and job stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// An unresolved request already exists for the subject
    #[error("approval already pending for {0}")]
    AlreadyPending(SubjectId),

    /// No job with this id
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// A record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend failed
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
