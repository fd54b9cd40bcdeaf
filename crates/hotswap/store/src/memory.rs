//! In-memory storage implementation

use crate::error::{StoreError, StoreResult};
use crate::traits::{ApprovalStore, JobStore, SwapOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotswap_types::{
    ApprovalId, ApprovalRequest, ApprovalStatus, ExecutionJob, JobId, JobStatus, SubjectId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for development and testing.
///
/// Cloning shares the underlying record sets, so one store can be handed to
/// the gate, the queue and a test harness at once.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    approvals: Arc<RwLock<HashMap<SubjectId, ApprovalRequest>>>,
    jobs: Arc<RwLock<HashMap<JobId, ExecutionJob>>>,
    job_sequence: Arc<AtomicU64>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            approvals: Arc::new(RwLock::new(HashMap::new())),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            job_sequence: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl ApprovalStore for InMemoryStore {
    async fn insert_request(&self, request: ApprovalRequest) -> StoreResult<()> {
        let mut approvals = self.approvals.write().await;
        if let Some(existing) = approvals.get(&request.subject_id) {
            if existing.status == ApprovalStatus::Pending {
                return Err(StoreError::AlreadyPending(request.subject_id));
            }
        }
        approvals.insert(request.subject_id.clone(), request);
        Ok(())
    }

    async fn get_request(&self, subject_id: &SubjectId) -> StoreResult<Option<ApprovalRequest>> {
        let approvals = self.approvals.read().await;
        Ok(approvals.get(subject_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: ApprovalStatus,
        next: ApprovalRequest,
    ) -> StoreResult<SwapOutcome<ApprovalRequest>> {
        let mut approvals = self.approvals.write().await;
        let Some(current) = approvals.get_mut(&next.subject_id) else {
            return Ok(SwapOutcome::Missing);
        };

        if current.id != next.id || current.status != expected {
            return Ok(SwapOutcome::Stale(current.clone()));
        }

        *current = next.clone();
        Ok(SwapOutcome::Swapped(next))
    }

    async fn list_pending(&self) -> StoreResult<Vec<ApprovalRequest>> {
        let approvals = self.approvals.read().await;
        let mut pending: Vec<_> = approvals
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.requested_at);
        Ok(pending)
    }

    async fn list_approved(&self) -> StoreResult<Vec<ApprovalRequest>> {
        let approvals = self.approvals.read().await;
        let mut approved: Vec<_> = approvals
            .values()
            .filter(|r| r.status.is_approved())
            .cloned()
            .collect();
        approved.sort_by_key(|r| r.responded_at);
        Ok(approved)
    }

    async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        reason: &str,
    ) -> StoreResult<Vec<ApprovalRequest>> {
        let mut approvals = self.approvals.write().await;
        let mut expired = Vec::new();

        for record in approvals.values_mut() {
            if record.is_overdue(now) {
                *record = record.expired(reason, now);
                expired.push(record.clone());
            }
        }

        Ok(expired)
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn insert_job(&self, mut job: ExecutionJob) -> StoreResult<ExecutionJob> {
        job.sequence = self.job_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<ExecutionJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn update_job(&self, job: ExecutionJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job;
                Ok(())
            }
            None => Err(StoreError::JobNotFound(job.id)),
        }
    }

    async fn claim_next(&self) -> StoreResult<Option<ExecutionJob>> {
        let mut jobs = self.jobs.write().await;
        let next = jobs
            .values_mut()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| j.sequence);

        Ok(next.map(|job| {
            *job = job.started();
            job.clone()
        }))
    }

    async fn list_jobs(&self, status: Option<JobStatus>) -> StoreResult<Vec<ExecutionJob>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<_> = jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        matching.sort_by_key(|j| j.sequence);
        Ok(matching)
    }

    async fn job_for_approval(
        &self,
        approval_id: &ApprovalId,
    ) -> StoreResult<Option<ExecutionJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .find(|j| j.approval_id.as_ref() == Some(approval_id))
            .cloned())
    }

    async fn recover_running(&self) -> StoreResult<Vec<ExecutionJob>> {
        let mut jobs = self.jobs.write().await;
        let mut recovered = Vec::new();

        for job in jobs.values_mut() {
            if job.status == JobStatus::Running {
                *job = job.requeued();
                recovered.push(job.clone());
            }
        }

        if !recovered.is_empty() {
            tracing::info!(count = recovered.len(), "Returned interrupted jobs to the queue");
        }
        recovered.sort_by_key(|j| j.sequence);
        Ok(recovered)
    }
}
