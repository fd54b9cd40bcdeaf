//! Approval request lifecycle types
//!
//! An [`ApprovalRequest`] is created Pending (or AutoApproved, which is
//! terminal from birth) and moves at most once to Approved, Rejected or
//! Expired.

use crate::{ApprovalId, BreakingChange, ProposedChange, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Approval request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    AutoApproved,
}

impl ApprovalStatus {
    /// No further transition is permitted from a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether the change may proceed to execution
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved | Self::AutoApproved)
    }

    /// Legal transitions: Pending to Approved, Rejected or Expired
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Expired)
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
            Self::AutoApproved => write!(f, "auto_approved"),
        }
    }
}

/// How much scrutiny a change requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    Standard,
    Elevated,
    Critical,
}

impl fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Elevated => write!(f, "elevated"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Why a change needs approval, as shown to the reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDetails {
    /// Required approval level
    pub level: ApprovalLevel,

    /// Classification reason
    pub reason: String,

    /// Breaking changes found by the classifier
    #[serde(default)]
    pub breaking_changes: Vec<BreakingChange>,
}

/// Approve or reject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn status(&self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// A human decision, merged into the request it targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub subject_id: SubjectId,
    pub actor: String,
    pub verdict: Verdict,
    pub reason: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ApprovalDecision {
    pub fn new(
        subject_id: SubjectId,
        actor: impl Into<String>,
        verdict: Verdict,
        reason: Option<String>,
    ) -> Self {
        Self {
            subject_id,
            actor: actor.into(),
            verdict,
            reason,
            decided_at: Utc::now(),
        }
    }
}

/// Approval request for a single subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request identifier
    pub id: ApprovalId,

    /// Subject under governance
    pub subject_id: SubjectId,

    /// Who asked for the change
    pub requester: String,

    /// Actors allowed to decide; empty means any authorized actor
    #[serde(default)]
    pub approvers: Vec<String>,

    /// Current status
    pub status: ApprovalStatus,

    /// Created timestamp
    pub requested_at: DateTime<Utc>,

    /// Deadline after which a Pending request expires
    pub timeout_at: DateTime<Utc>,

    /// When the request left Pending
    pub responded_at: Option<DateTime<Utc>>,

    /// Who moved the request out of Pending
    pub responded_by: Option<String>,

    /// Reason recorded with the response
    pub response_reason: Option<String>,

    /// Classification details (absent for auto-approved requests)
    #[serde(default)]
    pub details: Option<ApprovalDetails>,

    /// The change being governed
    #[serde(default)]
    pub change: Option<ProposedChange>,
}

impl ApprovalRequest {
    /// Create a Pending request
    pub fn pending(
        subject_id: SubjectId,
        requester: impl Into<String>,
        approvers: Vec<String>,
        timeout: chrono::Duration,
        details: ApprovalDetails,
    ) -> Self {
        let requested_at = Utc::now();
        Self {
            id: ApprovalId::generate(),
            subject_id,
            requester: requester.into(),
            approvers,
            status: ApprovalStatus::Pending,
            requested_at,
            timeout_at: requested_at + timeout,
            responded_at: None,
            responded_by: None,
            response_reason: None,
            details: Some(details),
            change: None,
        }
    }

    /// Create a request that is terminal from birth
    pub fn auto_approved(
        subject_id: SubjectId,
        requester: impl Into<String>,
        approvers: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApprovalId::generate(),
            subject_id,
            requester: requester.into(),
            approvers,
            status: ApprovalStatus::AutoApproved,
            requested_at: now,
            timeout_at: now,
            responded_at: Some(now),
            responded_by: Some("system".to_string()),
            response_reason: Some(reason.into()),
            details: None,
            change: None,
        }
    }

    pub fn with_change(mut self, change: ProposedChange) -> Self {
        self.change = Some(change);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending and past its deadline
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && now >= self.timeout_at
    }

    /// Whether `actor` is allowed to decide this request
    pub fn can_be_decided_by(&self, actor: &str) -> bool {
        self.approvers.is_empty() || self.approvers.iter().any(|a| a == actor)
    }

    /// Time left before the deadline, zero when already due
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.timeout_at - now).to_std().unwrap_or_default()
    }

    /// Copy of this request moved to `status`; callers persist it with a
    /// conditional update keyed on the current status.
    pub fn resolved(
        &self,
        status: ApprovalStatus,
        by: impl Into<String>,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.responded_at = Some(at.max(self.requested_at));
        next.responded_by = Some(by.into());
        next.response_reason = reason;
        next
    }

    /// Copy of this request with a decision merged in
    pub fn decided(&self, decision: &ApprovalDecision) -> Self {
        self.resolved(
            decision.verdict.status(),
            decision.actor.clone(),
            decision.reason.clone(),
            decision.decided_at,
        )
    }

    /// Copy of this request marked Expired
    pub fn expired(&self, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.resolved(ApprovalStatus::Expired, "system", Some(reason.into()), at)
    }
}
