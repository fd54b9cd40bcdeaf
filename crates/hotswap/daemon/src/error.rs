//! Error types for hotswapd

use hotswap_audit::AuditError;
use hotswap_orchestrator::OrchestratorError;
use hotswap_queue::QueueError;
use thiserror::Error;

/// Daemon error type
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
