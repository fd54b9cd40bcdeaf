//! Audit entry types

use chrono::{DateTime, Utc};
use hotswap_types::SubjectId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A hash-chained audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// When the recorded transition happened
    pub timestamp: DateTime<Utc>,

    /// What happened
    pub event: AuditEvent,

    /// Subject the event belongs to
    pub subject_id: SubjectId,

    /// Who caused it (a user, or "system" for sweeps and timeouts)
    pub actor: String,

    /// Result of the event
    pub outcome: AuditOutcome,

    /// Additional details (reason, level, job id, ...)
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,

    /// Hash of the previous entry in the chain
    pub previous_hash: Option<String>,

    /// Hash of this entry
    pub entry_hash: String,
}

impl AuditEntry {
    /// Start recording an event; the sink assigns the chain hashes.
    pub fn record(
        event: AuditEvent,
        subject_id: &SubjectId,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> PartialAuditEntry {
        PartialAuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
            subject_id: subject_id.clone(),
            actor: actor.into(),
            outcome,
            context: BTreeMap::new(),
        }
    }

    /// Recompute the hash this entry should carry
    pub fn expected_hash(&self) -> String {
        chain_hash(
            &self.id,
            &self.timestamp,
            &self.event,
            &self.subject_id,
            &self.actor,
            &self.outcome,
            &self.context,
            self.previous_hash.as_deref(),
        )
    }

    /// Human-readable reason, if one was recorded
    pub fn reason(&self) -> Option<&str> {
        self.context.get("reason").and_then(|v| v.as_str())
    }
}

/// Audit entry before it is linked into a chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialAuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub subject_id: SubjectId,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub context: BTreeMap<String, serde_json::Value>,
}

impl PartialAuditEntry {
    /// Add context value
    pub fn context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Record a human-readable reason
    pub fn reason(self, reason: impl Into<String>) -> Self {
        self.context("reason", reason.into())
    }

    /// Link to the chain and compute this entry's hash
    pub fn finalize(self, previous_hash: Option<String>) -> AuditEntry {
        let entry_hash = chain_hash(
            &self.id,
            &self.timestamp,
            &self.event,
            &self.subject_id,
            &self.actor,
            &self.outcome,
            &self.context,
            previous_hash.as_deref(),
        );

        AuditEntry {
            id: self.id,
            timestamp: self.timestamp,
            event: self.event,
            subject_id: self.subject_id,
            actor: self.actor,
            outcome: self.outcome,
            context: self.context,
            previous_hash,
            entry_hash,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn chain_hash(
    id: &Uuid,
    timestamp: &DateTime<Utc>,
    event: &AuditEvent,
    subject_id: &SubjectId,
    actor: &str,
    outcome: &AuditOutcome,
    context: &BTreeMap<String, serde_json::Value>,
    previous_hash: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(serde_json::to_vec(event).unwrap_or_default());
    hasher.update(subject_id.as_str().as_bytes());
    hasher.update(actor.as_bytes());
    hasher.update(serde_json::to_vec(outcome).unwrap_or_default());
    hasher.update(serde_json::to_vec(context).unwrap_or_default());
    hasher.update(previous_hash.unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}

/// Audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    // Approval lifecycle
    ApprovalRequested,
    ApprovalAutoApproved,
    ApprovalGranted,
    ApprovalRejected,
    ApprovalExpired,

    // Orchestration
    ChangeEnqueued,
    ChangeAbandoned,

    // Execution
    JobSucceeded,
    JobFailed,
    JobRequeued,
}

impl AuditEvent {
    /// Events that close an approval request
    pub fn is_approval_terminal(&self) -> bool {
        matches!(
            self,
            Self::ApprovalAutoApproved
                | Self::ApprovalGranted
                | Self::ApprovalRejected
                | Self::ApprovalExpired
        )
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ApprovalRequested => "approval_requested",
            Self::ApprovalAutoApproved => "approval_auto_approved",
            Self::ApprovalGranted => "approval_granted",
            Self::ApprovalRejected => "approval_rejected",
            Self::ApprovalExpired => "approval_expired",
            Self::ChangeEnqueued => "change_enqueued",
            Self::ChangeAbandoned => "change_abandoned",
            Self::JobSucceeded => "job_succeeded",
            Self::JobFailed => "job_failed",
            Self::JobRequeued => "job_requeued",
        };
        f.write_str(name)
    }
}

/// Outcome of an audited event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure { reason: String },
    Denied { reason: String },
}

impl AuditOutcome {
    pub fn success() -> Self {
        Self::Success
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}
