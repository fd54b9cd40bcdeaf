//! Daemon wiring and lifecycle management

use crate::config::{AuditConfig, DaemonConfig};
use crate::error::DaemonResult;
use crate::executor::DryRunExecutor;
use hotswap_approval::{ApprovalGate, LogNotifier, Sweeper};
use hotswap_audit::{AuditSink, FileAuditSink, MemoryAuditSink};
use hotswap_classifier::ChangeClassifier;
use hotswap_orchestrator::Orchestrator;
use hotswap_queue::{ExecutionQueue, PipelineExecutor, ShutdownReport};
use hotswap_store::InMemoryStore;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Hotswap daemon server
pub struct Server {
    config: DaemonConfig,
    gate: Arc<ApprovalGate>,
    orchestrator: Arc<Orchestrator>,
    audit: Arc<dyn AuditSink>,
}

impl Server {
    /// Create a server that runs jobs through the dry-run executor
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        Self::with_executor(config, Arc::new(DryRunExecutor::default())).await
    }

    /// Create a server with the given pipeline executor
    pub async fn with_executor(
        config: DaemonConfig,
        executor: Arc<dyn PipelineExecutor>,
    ) -> DaemonResult<Self> {
        let store = Arc::new(InMemoryStore::new());

        let audit: Arc<dyn AuditSink> = match &config.audit {
            AuditConfig::Memory => Arc::new(MemoryAuditSink::new()),
            AuditConfig::File { path } => {
                tracing::info!(path = %path.display(), "Writing audit trail to file");
                Arc::new(FileAuditSink::open(path.clone()).await?)
            }
        };

        let gate = Arc::new(
            ApprovalGate::new(
                store.clone(),
                audit.clone(),
                ChangeClassifier::new(config.classifier),
                config.gate.to_gate_config(),
            )
            .with_notifier(Arc::new(LogNotifier)),
        );

        let queue = ExecutionQueue::start(
            store,
            executor,
            audit.clone(),
            config.queue.to_queue_config(),
        )
        .await?;

        let orchestrator = Orchestrator::new(
            gate.clone(),
            queue,
            audit.clone(),
            config.gate.to_orchestrator_config(),
        );

        Ok(Self {
            config,
            gate,
            orchestrator,
            audit,
        })
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run until SIGINT/SIGTERM
    pub async fn run(self) -> DaemonResult<ShutdownReport> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` completes, then stop gracefully
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> DaemonResult<ShutdownReport> {
        self.orchestrator.resume_pending().await?;

        let sweeper_cancel = CancellationToken::new();
        let sweeper = Sweeper::new(self.gate.clone(), self.config.sweeper.interval())
            .spawn(sweeper_cancel.clone());

        tracing::info!("hotswap daemon running");

        shutdown.await;

        tracing::info!("hotswap daemon shutting down");

        sweeper_cancel.cancel();
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Sweeper task ended abnormally");
        }

        let report = self
            .orchestrator
            .shutdown(self.config.queue.shutdown_grace())
            .await?;
        self.audit.flush().await?;

        Ok(report)
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
