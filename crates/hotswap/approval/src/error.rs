//! Approval gate error types

use hotswap_store::StoreError;
use hotswap_types::{ApprovalStatus, SubjectId};
use thiserror::Error;

/// Errors returned by the approval gate.
///
/// `NotPending`, `Expired` and `Unauthorized` are legitimate outcomes of a
/// race between mutators and are never retried.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No request exists for the subject
    #[error("no approval request for {0}")]
    NotFound(SubjectId),

    /// An unresolved request already exists for the subject
    #[error("approval already pending for {0}")]
    AlreadyPending(SubjectId),

    /// The request has already left Pending
    #[error("approval for {subject_id} is not pending (status: {status})")]
    NotPending {
        subject_id: SubjectId,
        status: ApprovalStatus,
    },

    /// The deadline passed before a decision arrived
    #[error("approval for {0} has expired")]
    Expired(SubjectId),

    /// The actor is not in the request's approver set
    #[error("{actor} is not an approver for {subject_id}")]
    Unauthorized { subject_id: SubjectId, actor: String },

    /// The request is malformed for the subject's policy
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The caller abandoned the wait; the request is untouched
    #[error("wait for {0} was cancelled")]
    Cancelled(SubjectId),

    /// The store failed
    #[error("approval storage failed: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for ApprovalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyPending(subject_id) => Self::AlreadyPending(subject_id),
            other => Self::Storage(other),
        }
    }
}

/// Result type for approval operations
pub type Result<T> = std::result::Result<T, ApprovalError>;
