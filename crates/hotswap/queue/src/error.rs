//! Execution queue error types

use hotswap_store::StoreError;
use thiserror::Error;

/// Errors raised by the execution queue
#[derive(Debug, Error)]
pub enum QueueError {
    /// Shutdown has been requested; no new work is accepted
    #[error("execution queue is shutting down")]
    ShuttingDown,

    /// The job store failed. Fatal to the worker loop.
    #[error("execution queue storage failed: {0}")]
    StorageFailed(#[from] StoreError),

    /// The worker task ended abnormally
    #[error("execution queue worker stopped: {0}")]
    WorkerStopped(String),
}

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;
