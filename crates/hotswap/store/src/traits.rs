//! Storage trait definitions

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotswap_types::{
    ApprovalId, ApprovalRequest, ApprovalStatus, ExecutionJob, JobId, JobStatus, SubjectId,
};

/// Outcome of a conditional update
#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome<T> {
    /// The record matched and was replaced
    Swapped(T),
    /// The record changed underneath the caller; carries the current value
    Stale(T),
    /// No record exists
    Missing,
}

impl<T> SwapOutcome<T> {
    pub fn is_swapped(&self) -> bool {
        matches!(self, Self::Swapped(_))
    }
}

/// Storage for approval requests, one current record per subject
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Persist a new request for its subject.
    ///
    /// Fails with `AlreadyPending` while the subject's current request is
    /// Pending; a terminal record is replaced.
    async fn insert_request(&self, request: ApprovalRequest) -> StoreResult<()>;

    /// Current request for a subject
    async fn get_request(&self, subject_id: &SubjectId) -> StoreResult<Option<ApprovalRequest>>;

    /// Replace the subject's record with `next` only if the stored record is
    /// the same request and still has status `expected`.
    ///
    /// This is the single mutation primitive for every approval transition.
    async fn compare_and_swap(
        &self,
        expected: ApprovalStatus,
        next: ApprovalRequest,
    ) -> StoreResult<SwapOutcome<ApprovalRequest>>;

    /// All Pending requests
    async fn list_pending(&self) -> StoreResult<Vec<ApprovalRequest>>;

    /// All Approved and AutoApproved requests
    async fn list_approved(&self) -> StoreResult<Vec<ApprovalRequest>>;

    /// Expire every Pending request due at `now`, returning the records this
    /// call transitioned.
    async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        reason: &str,
    ) -> StoreResult<Vec<ApprovalRequest>>;
}

/// Storage for execution jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a Queued job, assigning its FIFO sequence number
    async fn insert_job(&self, job: ExecutionJob) -> StoreResult<ExecutionJob>;

    /// Get a job by ID
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<ExecutionJob>>;

    /// Overwrite an existing job
    async fn update_job(&self, job: ExecutionJob) -> StoreResult<()>;

    /// Atomically take the oldest Queued job and mark it Running
    async fn claim_next(&self) -> StoreResult<Option<ExecutionJob>>;

    /// Jobs with the given status (all jobs when `None`), in sequence order
    async fn list_jobs(&self, status: Option<JobStatus>) -> StoreResult<Vec<ExecutionJob>>;

    /// Job released by the given approval, if one was enqueued
    async fn job_for_approval(
        &self,
        approval_id: &ApprovalId,
    ) -> StoreResult<Option<ExecutionJob>>;

    /// Return jobs left Running by a previous process to Queued
    async fn recover_running(&self) -> StoreResult<Vec<ExecutionJob>>;
}

/// Combined storage trait
pub trait Store: ApprovalStore + JobStore + Send + Sync {}

impl<T> Store for T where T: ApprovalStore + JobStore + Send + Sync {}
