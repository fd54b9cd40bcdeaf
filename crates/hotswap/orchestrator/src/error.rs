//! Orchestrator error types

use hotswap_approval::ApprovalError;
use hotswap_queue::QueueError;
use thiserror::Error;

/// Errors returned by the orchestration facade
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The approval gate refused the change
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// The execution queue refused the job
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Shutdown has been requested
    #[error("orchestrator is shutting down")]
    ShuttingDown,
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
