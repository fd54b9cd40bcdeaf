//! Pipeline executor interface

use async_trait::async_trait;
use hotswap_types::ExecutionJob;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors an executor may report
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The pipeline ran and failed; recorded on the job
    #[error("execution failed: {0}")]
    Failed(String),

    /// The pipeline stopped because its token fired; the job is requeued
    #[error("execution cancelled")]
    Cancelled,
}

/// Runs the deployment pipeline for a job.
///
/// Implementations may run for a long time and should watch `cancel`,
/// returning [`ExecutorError::Cancelled`] when it fires so the job goes back
/// to the queue instead of being marked failed.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &ExecutionJob,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value, ExecutorError>;
}
