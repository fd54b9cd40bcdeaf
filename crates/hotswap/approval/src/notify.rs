//! Notification sinks
//!
//! Notifications are best effort: the gate logs a failed delivery at `warn`
//! and carries on.

use async_trait::async_trait;
use hotswap_types::ApprovalRequest;
use std::fmt;
use thiserror::Error;

/// Approval lifecycle notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalNotification {
    Created,
    AutoApproved,
    Approved,
    Rejected,
    Expired,
}

impl fmt::Display for ApprovalNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Delivery failure reported by a sink
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Receives approval lifecycle notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        kind: ApprovalNotification,
        request: &ApprovalRequest,
    ) -> Result<(), NotifyError>;
}

/// Discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify(
        &self,
        _kind: ApprovalNotification,
        _request: &ApprovalRequest,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Writes notifications to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(
        &self,
        kind: ApprovalNotification,
        request: &ApprovalRequest,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            subject_id = %request.subject_id,
            approval_id = %request.id,
            notification = %kind,
            approvers = ?request.approvers,
            "Approval notification"
        );
        Ok(())
    }
}
