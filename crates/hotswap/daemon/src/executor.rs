//! Dry-run pipeline executor
//!
//! Stands in for the deployment pipeline when the daemon runs without one:
//! it logs the job, waits for the configured delay and reports success.

use async_trait::async_trait;
use hotswap_queue::{ExecutorError, PipelineExecutor};
use hotswap_types::ExecutionJob;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Executor that simulates a pipeline run
#[derive(Debug, Clone)]
pub struct DryRunExecutor {
    delay: Duration,
}

impl DryRunExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for DryRunExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

#[async_trait]
impl PipelineExecutor for DryRunExecutor {
    async fn execute(
        &self,
        job: &ExecutionJob,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value, ExecutorError> {
        tracing::info!(
            job_id = %job.id,
            subject_id = %job.subject_id,
            attempt = job.attempts,
            "Dry run: executing pipeline"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(ExecutorError::Cancelled),
            _ = tokio::time::sleep(self.delay) => Ok(serde_json::json!({
                "dry_run": true,
                "subject_id": job.subject_id.as_str(),
                "attempt": job.attempts,
            })),
        }
    }
}
