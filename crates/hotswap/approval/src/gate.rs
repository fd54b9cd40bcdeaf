//! Approval gate
//!
//! Owns the [`ApprovalRequest`] lifecycle. Persisted status is the only
//! source of truth: every transition (human decision, deadline expiry inside
//! a wait, bulk sweep) is a conditional update on the current status, so
//! exactly one mutator wins and the others observe the new state.
//!
//! Waiters in this process are woken through a per-subject watch channel.
//! That is only a latency optimisation; waits also poll the store with
//! backoff, so a decision made by another process is still observed.

use crate::config::GateConfig;
use crate::error::{ApprovalError, Result};
use crate::notify::{ApprovalNotification, NoopNotifier, NotificationSink};
use chrono::Utc;
use dashmap::DashMap;
use hotswap_audit::{AuditEntry, AuditEvent, AuditOutcome, AuditSink, PartialAuditEntry};
use hotswap_classifier::{ChangeClassifier, Classification};
use hotswap_store::{ApprovalStore, SwapOutcome};
use hotswap_types::{
    ApprovalDecision, ApprovalRequest, ApprovalStatus, ProposedChange, SchemaDefinition,
    SubjectId, Verdict,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Reason recorded on every expired request.
pub const TIMEOUT_REASON: &str = "timed out";

/// Actor recorded for transitions the gate makes on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// Input to [`ApprovalGate::request_approval`].
#[derive(Debug, Clone)]
pub struct NewApproval {
    /// The change to govern; its subject keys the request
    pub change: ProposedChange,

    /// Subject's current schema, `None` for a first version
    pub baseline: Option<SchemaDefinition>,

    /// Who is asking
    pub requester: String,

    /// Who may decide; empty means any authorized actor
    pub approvers: Vec<String>,

    /// How long the request stays Pending
    pub timeout: Duration,
}

impl NewApproval {
    pub fn new(change: ProposedChange, requester: impl Into<String>, timeout: Duration) -> Self {
        Self {
            change,
            baseline: None,
            requester: requester.into(),
            approvers: Vec::new(),
            timeout,
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
}

/// The approval gate.
pub struct ApprovalGate {
    store: Arc<dyn ApprovalStore>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationSink>,
    classifier: ChangeClassifier,
    config: GateConfig,
    waiters: DashMap<SubjectId, watch::Sender<ApprovalStatus>>,
}

impl ApprovalGate {
    /// Create a gate over `store`, recording transitions to `audit`
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        audit: Arc<dyn AuditSink>,
        classifier: ChangeClassifier,
        config: GateConfig,
    ) -> Self {
        Self {
            store,
            audit,
            notifier: Arc::new(NoopNotifier),
            classifier,
            config,
            waiters: DashMap::new(),
        }
    }

    /// Replace the notification sink
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn classifier(&self) -> &ChangeClassifier {
        &self.classifier
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Classify a change and open its approval request.
    ///
    /// Changes that need no sign-off get a terminal AutoApproved record.
    #[instrument(skip(self, request), fields(subject_id = %request.change.subject_id))]
    pub async fn request_approval(&self, request: NewApproval) -> Result<ApprovalRequest> {
        self.validate(&request)?;

        let NewApproval {
            change,
            baseline,
            requester,
            approvers,
            timeout,
        } = request;
        let subject_id = change.subject_id.clone();

        match self.classifier.classify(&change, baseline.as_ref()) {
            Classification::NoApprovalNeeded { reason } => {
                let record =
                    ApprovalRequest::auto_approved(subject_id, requester, approvers, reason)
                        .with_change(change);
                self.store.insert_request(record.clone()).await?;

                self.record(
                    AuditEntry::record(
                        AuditEvent::ApprovalAutoApproved,
                        &record.subject_id,
                        record.requester.clone(),
                        AuditOutcome::success(),
                    )
                    .reason(record.response_reason.clone().unwrap_or_default())
                    .context("approval_id", record.id.to_string()),
                )
                .await;
                self.notify(ApprovalNotification::AutoApproved, &record).await;

                info!(
                    subject_id = %record.subject_id,
                    approval_id = %record.id,
                    "Change auto-approved"
                );
                Ok(record)
            }
            Classification::ApprovalRequired(details) => {
                if let Some(min_level) = self.config.require_named_approvers_at {
                    if details.level >= min_level && approvers.is_empty() {
                        return Err(ApprovalError::ValidationFailed(format!(
                            "{} approval for {} requires named approvers",
                            details.level, subject_id
                        )));
                    }
                }

                let timeout = chrono::Duration::from_std(timeout).map_err(|_| {
                    ApprovalError::ValidationFailed(format!("timeout {:?} is out of range", timeout))
                })?;

                let record =
                    ApprovalRequest::pending(subject_id, requester, approvers, timeout, details)
                        .with_change(change);
                self.store.insert_request(record.clone()).await?;
                self.register_waiter(&record.subject_id);

                let mut entry = AuditEntry::record(
                    AuditEvent::ApprovalRequested,
                    &record.subject_id,
                    record.requester.clone(),
                    AuditOutcome::success(),
                )
                .context("approval_id", record.id.to_string())
                .context("timeout_at", record.timeout_at);
                if let Some(details) = &record.details {
                    entry = entry
                        .reason(details.reason.clone())
                        .context("level", details.level)
                        .context("breaking_changes", &details.breaking_changes);
                }
                self.record(entry).await;
                self.notify(ApprovalNotification::Created, &record).await;

                info!(
                    subject_id = %record.subject_id,
                    approval_id = %record.id,
                    timeout_at = %record.timeout_at,
                    "Approval requested"
                );
                Ok(record)
            }
        }
    }

    /// Approve or reject the subject's Pending request.
    #[instrument(skip(self, reason), fields(subject_id = %subject_id, actor = %actor))]
    pub async fn decide(
        &self,
        subject_id: &SubjectId,
        actor: &str,
        verdict: Verdict,
        reason: Option<String>,
    ) -> Result<ApprovalRequest> {
        let record = self.load(subject_id).await?;
        if record.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending {
                subject_id: subject_id.clone(),
                status: record.status,
            });
        }

        let reason = match (verdict, reason) {
            (_, Some(reason)) => Some(reason),
            (Verdict::Reject, None) => Some(format!("rejected by {}", actor)),
            (Verdict::Approve, None) => None,
        };
        let decision = ApprovalDecision::new(subject_id.clone(), actor, verdict, reason);

        if record.is_overdue(decision.decided_at) {
            return match self.expire(&record).await? {
                SwapOutcome::Stale(current) if current.status != ApprovalStatus::Expired => {
                    Err(ApprovalError::NotPending {
                        subject_id: subject_id.clone(),
                        status: current.status,
                    })
                }
                SwapOutcome::Missing => Err(ApprovalError::NotFound(subject_id.clone())),
                _ => Err(ApprovalError::Expired(subject_id.clone())),
            };
        }

        if !record.can_be_decided_by(actor) {
            warn!(
                subject_id = %subject_id,
                actor = %actor,
                "Decision refused: actor is not an approver"
            );
            return Err(ApprovalError::Unauthorized {
                subject_id: subject_id.clone(),
                actor: actor.to_string(),
            });
        }

        let next = record.decided(&decision);
        let decided = match self
            .store
            .compare_and_swap(ApprovalStatus::Pending, next)
            .await?
        {
            SwapOutcome::Swapped(decided) => decided,
            SwapOutcome::Stale(current) if current.status == ApprovalStatus::Expired => {
                return Err(ApprovalError::Expired(subject_id.clone()));
            }
            SwapOutcome::Stale(current) => {
                return Err(ApprovalError::NotPending {
                    subject_id: subject_id.clone(),
                    status: current.status,
                });
            }
            SwapOutcome::Missing => return Err(ApprovalError::NotFound(subject_id.clone())),
        };

        let (event, outcome, notification) = match verdict {
            Verdict::Approve => (
                AuditEvent::ApprovalGranted,
                AuditOutcome::success(),
                ApprovalNotification::Approved,
            ),
            Verdict::Reject => (
                AuditEvent::ApprovalRejected,
                AuditOutcome::denied(decided.response_reason.clone().unwrap_or_default()),
                ApprovalNotification::Rejected,
            ),
        };
        let mut entry = AuditEntry::record(event, subject_id, actor, outcome)
            .context("approval_id", decided.id.to_string());
        if let Some(reason) = &decided.response_reason {
            entry = entry.reason(reason.clone());
        }
        self.record(entry).await;
        self.notify(notification, &decided).await;
        self.release(subject_id, decided.status);

        info!(
            subject_id = %subject_id,
            actor = %actor,
            status = %decided.status,
            "Approval decided"
        );
        Ok(decided)
    }

    /// Suspend until the subject's request is terminal.
    ///
    /// Expires the request when its deadline elapses. Cancelling `cancel`
    /// abandons only this call and leaves the request untouched.
    #[instrument(skip(self, cancel), fields(subject_id = %subject_id))]
    pub async fn wait_for_decision(
        &self,
        subject_id: &SubjectId,
        cancel: &CancellationToken,
    ) -> Result<ApprovalRequest> {
        let mut poll_delay = self.config.poll_initial;

        loop {
            // Subscribe before loading so a decision landing in between
            // still wakes us.
            let mut signal = self.subscribe(subject_id);
            let record = match self.load(subject_id).await {
                Ok(record) => record,
                Err(e) => {
                    drop(signal);
                    self.forget_waiter(subject_id);
                    return Err(e);
                }
            };

            if record.is_terminal() {
                drop(signal);
                self.forget_waiter(subject_id);
                return Ok(record);
            }

            let now = Utc::now();
            if record.is_overdue(now) {
                return self.expire_on_timeout(&record).await;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(subject_id = %subject_id, "Wait for decision cancelled");
                    return Err(ApprovalError::Cancelled(subject_id.clone()));
                }
                _ = tokio::time::sleep(record.remaining(now)) => {
                    return self.expire_on_timeout(&record).await;
                }
                _ = signal.changed() => {}
                _ = tokio::time::sleep(poll_delay) => {
                    poll_delay = self.config.next_poll(poll_delay);
                }
            }
        }
    }

    /// Expire every overdue Pending request, returning how many this call
    /// transitioned.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<usize> {
        let expired = self
            .store
            .expire_overdue(Utc::now(), TIMEOUT_REASON)
            .await?;

        for record in &expired {
            self.on_expired(record).await;
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Swept expired approval requests");
        }
        Ok(expired.len())
    }

    /// Current request for a subject
    pub async fn get(&self, subject_id: &SubjectId) -> Result<ApprovalRequest> {
        self.load(subject_id).await
    }

    /// All Pending requests, oldest first
    pub async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self.store.list_pending().await?)
    }

    /// All Approved and AutoApproved requests, earliest decision first
    pub async fn list_approved(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self.store.list_approved().await?)
    }

    fn validate(&self, request: &NewApproval) -> Result<()> {
        if request.requester.trim().is_empty() {
            return Err(ApprovalError::ValidationFailed(
                "requester must not be blank".into(),
            ));
        }
        if request.timeout.is_zero() {
            return Err(ApprovalError::ValidationFailed(
                "timeout must be greater than zero".into(),
            ));
        }
        if request.timeout > self.config.max_timeout {
            return Err(ApprovalError::ValidationFailed(format!(
                "timeout {:?} exceeds maximum {:?}",
                request.timeout, self.config.max_timeout
            )));
        }

        let mut seen = HashSet::new();
        for approver in &request.approvers {
            if approver.trim().is_empty() {
                return Err(ApprovalError::ValidationFailed(
                    "approver entries must not be blank".into(),
                ));
            }
            if !seen.insert(approver.as_str()) {
                return Err(ApprovalError::ValidationFailed(format!(
                    "duplicate approver {}",
                    approver
                )));
            }
            if !self.config.allow_self_approval && approver == &request.requester {
                return Err(ApprovalError::ValidationFailed(format!(
                    "requester {} may not approve their own change",
                    approver
                )));
            }
        }

        Ok(())
    }

    async fn load(&self, subject_id: &SubjectId) -> Result<ApprovalRequest> {
        self.store
            .get_request(subject_id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(subject_id.clone()))
    }

    async fn expire_on_timeout(&self, record: &ApprovalRequest) -> Result<ApprovalRequest> {
        match self.expire(record).await? {
            SwapOutcome::Swapped(expired) => Ok(expired),
            // Someone else resolved it first
            SwapOutcome::Stale(current) => Ok(current),
            SwapOutcome::Missing => Err(ApprovalError::NotFound(record.subject_id.clone())),
        }
    }

    /// Conditionally move `record` from Pending to Expired
    async fn expire(&self, record: &ApprovalRequest) -> Result<SwapOutcome<ApprovalRequest>> {
        let expired = record.expired(TIMEOUT_REASON, Utc::now());
        let outcome = self
            .store
            .compare_and_swap(ApprovalStatus::Pending, expired)
            .await?;

        if let SwapOutcome::Swapped(expired) = &outcome {
            self.on_expired(expired).await;
        }
        Ok(outcome)
    }

    async fn on_expired(&self, record: &ApprovalRequest) {
        let reason = record
            .response_reason
            .clone()
            .unwrap_or_else(|| TIMEOUT_REASON.to_string());
        self.record(
            AuditEntry::record(
                AuditEvent::ApprovalExpired,
                &record.subject_id,
                SYSTEM_ACTOR,
                AuditOutcome::denied(reason.clone()),
            )
            .reason(reason)
            .context("approval_id", record.id.to_string()),
        )
        .await;
        self.notify(ApprovalNotification::Expired, record).await;
        self.release(&record.subject_id, record.status);

        info!(
            subject_id = %record.subject_id,
            approval_id = %record.id,
            "Approval request expired"
        );
    }

    fn register_waiter(&self, subject_id: &SubjectId) {
        self.waiters
            .entry(subject_id.clone())
            .or_insert_with(|| watch::channel(ApprovalStatus::Pending).0);
    }

    fn subscribe(&self, subject_id: &SubjectId) -> watch::Receiver<ApprovalStatus> {
        self.waiters
            .entry(subject_id.clone())
            .or_insert_with(|| watch::channel(ApprovalStatus::Pending).0)
            .subscribe()
    }

    /// Drop the subject's channel once nobody is listening on it
    fn forget_waiter(&self, subject_id: &SubjectId) {
        self.waiters
            .remove_if(subject_id, |_, tx| tx.receiver_count() == 0);
    }

    /// Wake every local waiter on `subject_id`
    fn release(&self, subject_id: &SubjectId, status: ApprovalStatus) {
        if let Some((_, tx)) = self.waiters.remove(subject_id) {
            tx.send_replace(status);
        }
    }

    async fn record(&self, entry: PartialAuditEntry) {
        let event = entry.event;
        if let Err(e) = self.audit.append(entry).await {
            warn!(event = %event, error = %e, "Failed to append audit entry");
        }
    }

    async fn notify(&self, kind: ApprovalNotification, request: &ApprovalRequest) {
        if let Err(e) = self.notifier.notify(kind, request).await {
            warn!(
                subject_id = %request.subject_id,
                notification = %kind,
                error = %e,
                "Failed to deliver approval notification"
            );
        }
    }
}
