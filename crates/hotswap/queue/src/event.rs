//! Job lifecycle events

use hotswap_types::{JobId, SubjectId};

/// Events broadcast by the execution queue
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Job accepted and visible as Queued
    Queued { job_id: JobId, subject_id: SubjectId },

    /// Worker picked the job up
    Started { job_id: JobId, attempt: u32 },

    /// Executor finished successfully
    Succeeded { job_id: JobId },

    /// Executor reported an error; recorded on the job
    Failed { job_id: JobId, error: String },

    /// Job returned to the queue (cancelled run or crash recovery)
    Requeued { job_id: JobId },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Queued { job_id, .. }
            | Self::Started { job_id, .. }
            | Self::Succeeded { job_id }
            | Self::Failed { job_id, .. }
            | Self::Requeued { job_id } => *job_id,
        }
    }
}
