//! Approval deadlines.
//!
//! A Pending request expires once its deadline passes, whichever of the
//! waiter, a late decider or the sweeper notices first. A decision that
//! arrives in time always wins.

use chrono::Utc;
use hotswap_approval::{ApprovalError, NewApproval, SYSTEM_ACTOR, TIMEOUT_REASON};
use hotswap_audit::AuditEvent;
use hotswap_tests::{module_change, Harness};
use hotswap_types::{ApprovalStatus, RiskTier, SubjectId, Verdict};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn gated(subject: &str, timeout: Duration) -> NewApproval {
    NewApproval::new(module_change(subject, RiskTier::High), "dev@x.com", timeout)
}

#[tokio::test]
async fn short_deadline_expires_waiter() {
    let h = Harness::new().await;
    let subject = SubjectId::new("orders");
    h.gate
        .request_approval(gated("orders", Duration::from_millis(10)))
        .await
        .unwrap();

    let record = tokio::time::timeout(
        Duration::from_secs(5),
        h.gate.wait_for_decision(&subject, &CancellationToken::new()),
    )
    .await
    .expect("wait ends at the deadline")
    .unwrap();

    assert_eq!(record.status, ApprovalStatus::Expired);
    assert_eq!(record.response_reason.as_deref(), Some(TIMEOUT_REASON));
    assert_eq!(record.responded_by.as_deref(), Some(SYSTEM_ACTOR));

    // Too late to decide now
    let err = h
        .gate
        .decide(&subject, "lead@x.com", Verdict::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApprovalError::NotPending {
            status: ApprovalStatus::Expired,
            ..
        }
    ));
}

#[tokio::test]
async fn decision_well_inside_a_day_long_deadline_wins() {
    let h = Harness::new().await;
    let subject = SubjectId::new("orders");
    let opened = h
        .gate
        .request_approval(gated("orders", DAY))
        .await
        .unwrap();
    assert!(opened.remaining(Utc::now()) > DAY - Duration::from_secs(60));

    let waiter = {
        let gate = h.gate.clone();
        let subject = subject.clone();
        tokio::spawn(async move {
            gate.wait_for_decision(&subject, &CancellationToken::new())
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.gate
        .decide(&subject, "lead@x.com", Verdict::Approve, None)
        .await
        .unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter woken by the decision")
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Approved);
    assert!(record.responded_at.unwrap() < record.timeout_at);

    // Nothing left for the sweeper
    assert_eq!(h.gate.sweep_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn late_decision_expires_unwatched_request() {
    let h = Harness::new().await;
    let subject = SubjectId::new("orders");
    h.gate
        .request_approval(gated("orders", Duration::from_millis(10)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = h
        .gate
        .decide(&subject, "lead@x.com", Verdict::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::Expired(_)));

    let record = h.gate.get(&subject).await.unwrap();
    assert_eq!(record.status, ApprovalStatus::Expired);
    assert_eq!(record.response_reason.as_deref(), Some(TIMEOUT_REASON));

    let events: Vec<_> = h.audit.entries_for(&subject).iter().map(|e| e.event).collect();
    assert_eq!(
        events,
        vec![AuditEvent::ApprovalRequested, AuditEvent::ApprovalExpired]
    );
}

#[tokio::test]
async fn cancelled_wait_leaves_request_pending() {
    let h = Harness::new().await;
    let subject = SubjectId::new("orders");
    h.gate
        .request_approval(gated("orders", Duration::from_secs(60)))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let waiter = {
        let gate = h.gate.clone();
        let subject = subject.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { gate.wait_for_decision(&subject, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, ApprovalError::Cancelled(_)));
    assert_eq!(
        h.gate.get(&subject).await.unwrap().status,
        ApprovalStatus::Pending
    );

    // A fresh waiter still sees the eventual decision
    h.gate
        .decide(&subject, "lead@x.com", Verdict::Reject, Some("freeze".into()))
        .await
        .unwrap();
    let record = h
        .gate
        .wait_for_decision(&subject, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(record.response_reason.as_deref(), Some("freeze"));
}
