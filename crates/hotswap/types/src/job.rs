//! Execution job types
//!
//! Jobs are owned by the execution queue while Queued or Running. Terminal
//! jobs keep their outcome in the job store.

use crate::{ApprovalId, JobId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of accepted work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionJob {
    /// Unique job identifier
    pub id: JobId,

    /// Subject the work applies to
    pub subject_id: SubjectId,

    /// Approval that released this job, if it came through the gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<ApprovalId>,

    /// Opaque payload for the pipeline executor
    pub payload: serde_json::Value,

    /// FIFO position, assigned by the job store on insert
    #[serde(default)]
    pub sequence: u64,

    /// Current status
    pub status: JobStatus,

    /// Enqueued timestamp
    pub queued_at: DateTime<Utc>,

    /// Last time the worker picked the job up
    pub started_at: Option<DateTime<Utc>>,

    /// Completion timestamp
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of times the job has been dispatched
    #[serde(default)]
    pub attempts: u32,

    /// Executor result on success
    pub result: Option<serde_json::Value>,

    /// Executor error on failure
    pub error: Option<String>,
}

impl ExecutionJob {
    /// Create a Queued job
    pub fn new(subject_id: SubjectId, payload: serde_json::Value) -> Self {
        Self {
            id: JobId::generate(),
            subject_id,
            approval_id: None,
            payload,
            sequence: 0,
            status: JobStatus::Queued,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            attempts: 0,
            result: None,
            error: None,
        }
    }

    /// Link the job to the approval that released it
    pub fn with_approval(mut self, approval_id: ApprovalId) -> Self {
        self.approval_id = Some(approval_id);
        self
    }

    /// Running copy of this job
    pub fn started(&self) -> Self {
        let mut next = self.clone();
        next.status = JobStatus::Running;
        next.started_at = Some(Utc::now());
        next.attempts += 1;
        next
    }

    /// Succeeded copy of this job
    pub fn succeeded(&self, result: serde_json::Value) -> Self {
        let mut next = self.clone();
        next.status = JobStatus::Succeeded;
        next.finished_at = Some(Utc::now());
        next.result = Some(result);
        next.error = None;
        next
    }

    /// Failed copy of this job
    pub fn failed(&self, error: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.status = JobStatus::Failed;
        next.finished_at = Some(Utc::now());
        next.error = Some(error.into());
        next
    }

    /// Copy returned to the queue for a later attempt
    pub fn requeued(&self) -> Self {
        let mut next = self.clone();
        next.status = JobStatus::Queued;
        next.started_at = None;
        next
    }
}
