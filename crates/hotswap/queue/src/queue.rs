//! Execution queue and its worker
//!
//! A single worker task owns every Running and terminal job transition. It
//! claims the oldest Queued job from the store, runs it through the
//! [`PipelineExecutor`], and records the outcome before claiming the next.
//!
//! Running more than one queue against the same job store needs an external
//! mutual-exclusion token; nothing here prevents two workers from claiming
//! from the same record set.

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::event::JobEvent;
use crate::executor::{ExecutorError, PipelineExecutor};
use hotswap_audit::{AuditEntry, AuditEvent, AuditOutcome, AuditSink, PartialAuditEntry};
use hotswap_store::JobStore;
use hotswap_types::{ApprovalId, ExecutionJob, JobId, JobStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const QUEUE_ACTOR: &str = "system";

/// Summary returned by [`ExecutionQueue::shutdown`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Jobs the worker finished (any outcome) during this run
    pub processed: u64,

    /// Jobs left Queued for the next start
    pub still_queued: usize,

    /// Whether the in-flight job had to be cancelled
    pub forced: bool,
}

/// Supervised single-worker execution queue
pub struct ExecutionQueue {
    store: Arc<dyn JobStore>,
    events: broadcast::Sender<JobEvent>,
    wake: Arc<Notify>,
    accepting: AtomicBool,
    stop: CancellationToken,
    abort: CancellationToken,
    worker: Mutex<Option<JoinHandle<Result<u64>>>>,
}

impl ExecutionQueue {
    /// Recover interrupted jobs and start the worker.
    pub async fn start(
        store: Arc<dyn JobStore>,
        executor: Arc<dyn PipelineExecutor>,
        audit: Arc<dyn AuditSink>,
        config: QueueConfig,
    ) -> Result<Arc<Self>> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let wake = Arc::new(Notify::new());
        let stop = CancellationToken::new();
        let abort = CancellationToken::new();

        let worker = Worker {
            store: store.clone(),
            executor,
            audit,
            events: events.clone(),
            wake: wake.clone(),
            stop: stop.clone(),
            abort: abort.clone(),
            idle_poll: config.idle_poll,
        };
        worker.recover().await?;
        let handle = tokio::spawn(worker.run());

        info!("Execution queue started");

        Ok(Arc::new(Self {
            store,
            events,
            wake,
            accepting: AtomicBool::new(true),
            stop,
            abort,
            worker: Mutex::new(Some(handle)),
        }))
    }

    /// Accept a job. Returns once it is visible as Queued.
    #[instrument(skip(self, job), fields(job_id = %job.id, subject_id = %job.subject_id))]
    pub async fn enqueue(&self, job: ExecutionJob) -> Result<JobId> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(QueueError::ShuttingDown);
        }

        let mut job = job;
        job.status = JobStatus::Queued;
        let job = self.store.insert_job(job).await?;
        self.wake.notify_one();

        debug!(job_id = %job.id, sequence = job.sequence, "Job queued");
        let _ = self.events.send(JobEvent::Queued {
            job_id: job.id,
            subject_id: job.subject_id.clone(),
        });
        Ok(job.id)
    }

    /// Look up a job
    pub async fn job(&self, id: &JobId) -> Result<Option<ExecutionJob>> {
        Ok(self.store.get_job(id).await?)
    }

    /// Job released by the given approval, if any
    pub async fn job_for_approval(&self, approval_id: &ApprovalId) -> Result<Option<ExecutionJob>> {
        Ok(self.store.job_for_approval(approval_id).await?)
    }

    /// Jobs with the given status, in queue order
    pub async fn jobs(&self, status: Option<JobStatus>) -> Result<Vec<ExecutionJob>> {
        Ok(self.store.list_jobs(status).await?)
    }

    /// Subscribe to job lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop the queue.
    ///
    /// New work is refused and the worker stops claiming jobs. The in-flight
    /// job gets `grace` to finish; after that its cancellation token fires
    /// and the queue waits for the executor to return.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, grace: Duration) -> Result<ShutdownReport> {
        self.accepting.store(false, Ordering::SeqCst);
        self.stop.cancel();

        let Some(mut handle) = self.worker.lock().await.take() else {
            return Err(QueueError::ShuttingDown);
        };

        let mut forced = false;
        let joined = match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "Grace period elapsed, cancelling in-flight job");
                forced = true;
                self.abort.cancel();
                handle.await
            }
        };

        let processed = joined.map_err(|e| QueueError::WorkerStopped(e.to_string()))??;
        let still_queued = self.store.list_jobs(Some(JobStatus::Queued)).await?.len();

        info!(processed, still_queued, forced, "Execution queue stopped");
        Ok(ShutdownReport {
            processed,
            still_queued,
            forced,
        })
    }
}

struct Worker {
    store: Arc<dyn JobStore>,
    executor: Arc<dyn PipelineExecutor>,
    audit: Arc<dyn AuditSink>,
    events: broadcast::Sender<JobEvent>,
    wake: Arc<Notify>,
    stop: CancellationToken,
    abort: CancellationToken,
    idle_poll: Duration,
}

impl Worker {
    /// Return jobs a crashed process left Running
    async fn recover(&self) -> Result<()> {
        for job in self.store.recover_running().await? {
            warn!(job_id = %job.id, attempts = job.attempts, "Requeued interrupted job");
            self.record(
                AuditEntry::record(
                    AuditEvent::JobRequeued,
                    &job.subject_id,
                    QUEUE_ACTOR,
                    AuditOutcome::success(),
                )
                .reason("interrupted by restart")
                .context("job_id", job.id.to_string())
                .context("attempts", job.attempts),
            )
            .await;
            let _ = self.events.send(JobEvent::Requeued { job_id: job.id });
        }
        Ok(())
    }

    async fn run(self) -> Result<u64> {
        let mut processed = 0;

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            let job = match self.store.claim_next().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = self.wake.notified() => {}
                        _ = tokio::time::sleep(self.idle_poll) => {}
                    }
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Failed to claim job, stopping worker");
                    return Err(QueueError::StorageFailed(e));
                }
            };

            if let Err(e) = self.process(job).await {
                error!(error = %e, "Failed to record job outcome, stopping worker");
                return Err(e);
            }
            processed += 1;
        }

        Ok(processed)
    }

    async fn process(&self, job: ExecutionJob) -> Result<()> {
        debug!(job_id = %job.id, attempt = job.attempts, "Job started");
        let _ = self.events.send(JobEvent::Started {
            job_id: job.id,
            attempt: job.attempts,
        });

        // The executor runs on its own task so a panic is captured as a
        // failed outcome.
        let executor = self.executor.clone();
        let running = job.clone();
        let cancel = self.abort.child_token();
        let outcome = tokio::spawn(async move { executor.execute(&running, cancel).await })
            .await
            .unwrap_or_else(|e| Err(ExecutorError::Failed(format!("executor panicked: {}", e))));

        let (next, event, entry) = match outcome {
            Ok(result) => {
                let next = job.succeeded(result);
                let entry = AuditEntry::record(
                    AuditEvent::JobSucceeded,
                    &job.subject_id,
                    QUEUE_ACTOR,
                    AuditOutcome::success(),
                );
                (next, JobEvent::Succeeded { job_id: job.id }, entry)
            }
            Err(ExecutorError::Cancelled) if self.abort.is_cancelled() => {
                let entry = AuditEntry::record(
                    AuditEvent::JobRequeued,
                    &job.subject_id,
                    QUEUE_ACTOR,
                    AuditOutcome::success(),
                )
                .reason("cancelled during shutdown");
                (job.requeued(), JobEvent::Requeued { job_id: job.id }, entry)
            }
            // Only a forced shutdown may return a job to the queue; an
            // executor that reports cancellation on its own has failed.
            Err(ExecutorError::Cancelled) => {
                let message = "executor cancelled outside shutdown".to_string();
                let entry = AuditEntry::record(
                    AuditEvent::JobFailed,
                    &job.subject_id,
                    QUEUE_ACTOR,
                    AuditOutcome::failure(message.clone()),
                )
                .reason(message.clone());
                (
                    job.failed(message.clone()),
                    JobEvent::Failed {
                        job_id: job.id,
                        error: message,
                    },
                    entry,
                )
            }
            Err(ExecutorError::Failed(message)) => {
                let entry = AuditEntry::record(
                    AuditEvent::JobFailed,
                    &job.subject_id,
                    QUEUE_ACTOR,
                    AuditOutcome::failure(message.clone()),
                )
                .reason(message.clone());
                (
                    job.failed(message.clone()),
                    JobEvent::Failed {
                        job_id: job.id,
                        error: message,
                    },
                    entry,
                )
            }
        };

        self.store.update_job(next.clone()).await?;

        match &event {
            JobEvent::Failed { error, .. } => {
                warn!(job_id = %job.id, error = %error, "Job failed")
            }
            JobEvent::Requeued { .. } => info!(job_id = %job.id, "Job returned to queue"),
            _ => info!(job_id = %job.id, "Job succeeded"),
        }

        self.record(
            entry
                .context("job_id", job.id.to_string())
                .context("attempts", next.attempts),
        )
        .await;
        let _ = self.events.send(event);
        Ok(())
    }

    async fn record(&self, entry: PartialAuditEntry) {
        let event = entry.event;
        if let Err(e) = self.audit.append(entry).await {
            warn!(event = %event, error = %e, "Failed to append audit entry");
        }
    }
}
