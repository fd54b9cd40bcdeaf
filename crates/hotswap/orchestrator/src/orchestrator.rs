//! Orchestration facade
//!
//! Composes the classifier, the approval gate and the execution queue for
//! each incoming change:
//! 1. Classify and open the approval request (auto-approved when no sign-off
//!    is needed).
//! 2. Auto-approved changes are enqueued straight away.
//! 3. Gated changes get a background flow that waits for the decision and
//!    enqueues only on approval. Rejected or expired changes are recorded as
//!    abandoned and never run.

use crate::error::{OrchestratorError, Result};
use dashmap::DashMap;
use hotswap_approval::{ApprovalError, ApprovalGate, NewApproval, SYSTEM_ACTOR};
use hotswap_audit::{AuditEntry, AuditEvent, AuditOutcome, AuditSink, PartialAuditEntry};
use hotswap_classifier::Classification;
use hotswap_queue::{ExecutionQueue, ShutdownReport};
use hotswap_types::{
    ApprovalRequest, ApprovalStatus, ExecutionJob, JobId, ProposedChange, SchemaDefinition,
    SubjectId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Approval timeout used when a submission does not set one.
    pub default_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }
}

/// A change submitted for governed execution
#[derive(Debug, Clone)]
pub struct Submission {
    pub change: ProposedChange,
    pub baseline: Option<SchemaDefinition>,
    pub requester: String,
    pub approvers: Vec<String>,
    pub timeout: Option<Duration>,
}

impl Submission {
    pub fn new(change: ProposedChange, requester: impl Into<String>) -> Self {
        Self {
            change,
            baseline: None,
            requester: requester.into(),
            approvers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_baseline(mut self, baseline: SchemaDefinition) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn with_approvers<I, S>(mut self, approvers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approvers = approvers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of [`Orchestrator::submit`]
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// No sign-off needed; the job is already queued
    Enqueued {
        approval: ApprovalRequest,
        job_id: JobId,
    },
    /// Waiting for a decision; the job is queued only if approved
    AwaitingApproval { approval: ApprovalRequest },
}

impl SubmitOutcome {
    pub fn approval(&self) -> &ApprovalRequest {
        match self {
            Self::Enqueued { approval, .. } | Self::AwaitingApproval { approval } => approval,
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Enqueued { job_id, .. } => Some(*job_id),
            Self::AwaitingApproval { .. } => None,
        }
    }
}

/// The orchestration facade
pub struct Orchestrator {
    gate: Arc<ApprovalGate>,
    queue: Arc<ExecutionQueue>,
    audit: Arc<dyn AuditSink>,
    config: OrchestratorConfig,
    flows: DashMap<SubjectId, JoinHandle<()>>,
    /// Serializes the job-exists check with the enqueue
    enqueue_lock: Mutex<()>,
    cancel: CancellationToken,
    shutting_down: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        gate: Arc<ApprovalGate>,
        queue: Arc<ExecutionQueue>,
        audit: Arc<dyn AuditSink>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            gate,
            queue,
            audit,
            config,
            flows: DashMap::new(),
            enqueue_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn gate(&self) -> &Arc<ApprovalGate> {
        &self.gate
    }

    pub fn queue(&self) -> &Arc<ExecutionQueue> {
        &self.queue
    }

    /// Classify without recording anything
    pub fn preview(
        &self,
        change: &ProposedChange,
        baseline: Option<&SchemaDefinition>,
    ) -> Classification {
        self.gate.classifier().classify(change, baseline)
    }

    /// Submit a change for governed execution
    #[instrument(skip(self, submission), fields(subject_id = %submission.change.subject_id))]
    pub async fn submit(self: &Arc<Self>, submission: Submission) -> Result<SubmitOutcome> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(OrchestratorError::ShuttingDown);
        }

        let Submission {
            change,
            baseline,
            requester,
            approvers,
            timeout,
        } = submission;
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        let mut request = NewApproval::new(change, requester, timeout).with_approvers(approvers);
        request.baseline = baseline;
        let approval = self.gate.request_approval(request).await?;

        match approval.status {
            ApprovalStatus::AutoApproved => {
                let job_id = self.enqueue_approved(&approval).await?;
                Ok(SubmitOutcome::Enqueued { approval, job_id })
            }
            _ => {
                self.arm(approval.subject_id.clone());
                Ok(SubmitOutcome::AwaitingApproval { approval })
            }
        }
    }

    /// Pick up approval work found in storage after a restart.
    ///
    /// Re-arms a flow for every Pending request and enqueues every Approved
    /// or AutoApproved request that has no job yet. Returns the number of
    /// flows armed plus jobs enqueued.
    #[instrument(skip(self))]
    pub async fn resume_pending(self: &Arc<Self>) -> Result<usize> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(OrchestratorError::ShuttingDown);
        }

        let mut armed = 0;
        for request in self.gate.list_pending().await? {
            if request.change.is_none() {
                warn!(
                    subject_id = %request.subject_id,
                    "Pending request carries no change, not resuming"
                );
                continue;
            }
            if self.has_active_flow(&request.subject_id) {
                continue;
            }
            self.arm(request.subject_id.clone());
            armed += 1;
        }

        if armed > 0 {
            info!(count = armed, "Resumed pending approval flows");
        }

        let mut enqueued = 0;
        for approval in self.gate.list_approved().await? {
            if approval.change.is_none() || self.has_active_flow(&approval.subject_id) {
                continue;
            }
            if self.queue.job_for_approval(&approval.id).await?.is_some() {
                continue;
            }
            self.enqueue_approved(&approval).await?;
            enqueued += 1;
        }

        if enqueued > 0 {
            info!(count = enqueued, "Enqueued approved changes left without a job");
        }
        Ok(armed + enqueued)
    }

    /// Subjects with a flow still waiting on a decision
    pub fn awaiting(&self) -> Vec<SubjectId> {
        self.flows
            .iter()
            .filter(|entry| !entry.value().is_finished())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Cancel outstanding waits and shut the queue down.
    ///
    /// Pending requests are left as they are; [`resume_pending`](Self::resume_pending)
    /// picks them up after a restart.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, grace: Duration) -> Result<ShutdownReport> {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.cancel.cancel();

        let subjects: Vec<SubjectId> = self.flows.iter().map(|e| e.key().clone()).collect();
        for subject_id in subjects {
            if let Some((_, handle)) = self.flows.remove(&subject_id) {
                if let Err(e) = handle.await {
                    warn!(subject_id = %subject_id, error = %e, "Approval flow ended abnormally");
                }
            }
        }

        Ok(self.queue.shutdown(grace).await?)
    }

    fn has_active_flow(&self, subject_id: &SubjectId) -> bool {
        self.flows
            .get(subject_id)
            .map_or(false, |handle| !handle.is_finished())
    }

    fn arm(self: &Arc<Self>, subject_id: SubjectId) {
        self.flows.retain(|_, handle| !handle.is_finished());

        let this = Arc::clone(self);
        let cancel = self.cancel.child_token();
        let flow_subject = subject_id.clone();
        let handle = tokio::spawn(async move { this.run_flow(flow_subject, cancel).await });
        self.flows.insert(subject_id, handle);
    }

    async fn run_flow(&self, subject_id: SubjectId, cancel: CancellationToken) {
        debug!(subject_id = %subject_id, "Waiting for approval decision");

        match self.gate.wait_for_decision(&subject_id, &cancel).await {
            Ok(record) if record.status.is_approved() => {
                if let Err(e) = self.enqueue_approved(&record).await {
                    error!(subject_id = %subject_id, error = %e, "Failed to enqueue approved change");
                    self.record(
                        AuditEntry::record(
                            AuditEvent::ChangeAbandoned,
                            &subject_id,
                            SYSTEM_ACTOR,
                            AuditOutcome::failure(e.to_string()),
                        )
                        .reason(format!("approved but not enqueued until resumed: {}", e))
                        .context("approval_id", record.id.to_string()),
                    )
                    .await;
                }
            }
            Ok(record) => self.abandon(&record).await,
            Err(ApprovalError::Cancelled(_)) => {
                debug!(subject_id = %subject_id, "Approval flow cancelled");
            }
            Err(e) => {
                error!(subject_id = %subject_id, error = %e, "Approval flow failed");
            }
        }
    }

    /// Enqueue the job for an approved request, at most once per approval
    async fn enqueue_approved(&self, approval: &ApprovalRequest) -> Result<JobId> {
        let _guard = self.enqueue_lock.lock().await;
        if let Some(existing) = self.queue.job_for_approval(&approval.id).await? {
            debug!(subject_id = %approval.subject_id, job_id = %existing.id, "Approval already has a job");
            return Ok(existing.id);
        }

        let payload = approval
            .change
            .as_ref()
            .map(|change| change.payload.clone())
            .unwrap_or_default();
        let job = ExecutionJob::new(approval.subject_id.clone(), payload).with_approval(approval.id);
        let job_id = self.queue.enqueue(job).await?;

        self.record(
            AuditEntry::record(
                AuditEvent::ChangeEnqueued,
                &approval.subject_id,
                approval
                    .responded_by
                    .clone()
                    .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
                AuditOutcome::success(),
            )
            .context("approval_id", approval.id.to_string())
            .context("job_id", job_id.to_string()),
        )
        .await;

        info!(subject_id = %approval.subject_id, job_id = %job_id, "Change enqueued");
        Ok(job_id)
    }

    async fn abandon(&self, record: &ApprovalRequest) {
        let reason = match &record.response_reason {
            Some(reason) => format!("{}: {}", record.status, reason),
            None => record.status.to_string(),
        };

        self.record(
            AuditEntry::record(
                AuditEvent::ChangeAbandoned,
                &record.subject_id,
                record
                    .responded_by
                    .clone()
                    .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
                AuditOutcome::denied(reason.clone()),
            )
            .reason(reason)
            .context("approval_id", record.id.to_string()),
        )
        .await;

        info!(
            subject_id = %record.subject_id,
            status = %record.status,
            "Change abandoned"
        );
    }

    async fn record(&self, entry: PartialAuditEntry) {
        let event = entry.event;
        if let Err(e) = self.audit.append(entry).await {
            warn!(event = %event, error = %e, "Failed to append audit entry");
        }
    }
}
