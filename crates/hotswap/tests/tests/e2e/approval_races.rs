//! Concurrent mutators on one approval request.
//!
//! Deciders, waiters and sweepers may all race to move a request out of
//! Pending. Exactly one of them wins, and the audit trail carries exactly
//! one terminal entry for the request.

use hotswap_approval::{ApprovalError, NewApproval, TIMEOUT_REASON};
use hotswap_audit::AuditEvent;
use hotswap_tests::{module_change, Harness};
use hotswap_types::{ApprovalStatus, RiskTier, SubjectId, Verdict};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn gated(subject: &str, timeout: Duration) -> NewApproval {
    NewApproval::new(module_change(subject, RiskTier::High), "dev@x.com", timeout)
}

fn terminal_entries(h: &Harness, subject: &SubjectId) -> usize {
    h.audit
        .entries_for(subject)
        .iter()
        .filter(|e| e.event.is_approval_terminal())
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_deciders_have_single_winner() {
    let h = Harness::new().await;
    let subject = SubjectId::new("orders");
    h.gate
        .request_approval(gated("orders", Duration::from_secs(60)))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let gate = h.gate.clone();
        let subject = subject.clone();
        let verdict = if i % 2 == 0 { Verdict::Approve } else { Verdict::Reject };
        tasks.push(tokio::spawn(async move {
            gate.decide(&subject, &format!("lead{}@x.com", i), verdict, None)
                .await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(ApprovalError::NotPending { status, .. }) => assert!(status.is_terminal()),
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(terminal_entries(&h, &subject), 1);
}

#[tokio::test]
async fn decision_racing_deadline_records_one_outcome() {
    let h = Harness::new().await;

    for round in 0..20u64 {
        let subject = SubjectId::new(format!("race-{}", round));
        h.gate
            .request_approval(gated(subject.as_str(), Duration::from_millis(20)))
            .await
            .unwrap();

        // Land the decision around the deadline
        tokio::time::sleep(Duration::from_millis(15 + round % 10)).await;

        let decider = {
            let gate = h.gate.clone();
            let subject = subject.clone();
            tokio::spawn(async move {
                gate.decide(&subject, "lead@x.com", Verdict::Approve, None)
                    .await
            })
        };
        let sweeper = {
            let gate = h.gate.clone();
            tokio::spawn(async move { gate.sweep_expired().await })
        };
        let waiter = {
            let gate = h.gate.clone();
            let subject = subject.clone();
            tokio::spawn(async move {
                gate.wait_for_decision(&subject, &CancellationToken::new())
                    .await
            })
        };

        let decided = decider.await.unwrap();
        sweeper.await.unwrap().unwrap();
        let waited = waiter.await.unwrap().unwrap();

        let record = h.gate.get(&subject).await.unwrap();
        assert_eq!(waited.status, record.status);
        match record.status {
            ApprovalStatus::Approved => {
                assert!(decided.is_ok());
                assert_eq!(record.responded_by.as_deref(), Some("lead@x.com"));
            }
            ApprovalStatus::Expired => {
                assert!(matches!(
                    decided,
                    Err(ApprovalError::Expired(_))
                        | Err(ApprovalError::NotPending {
                            status: ApprovalStatus::Expired,
                            ..
                        })
                ));
                assert_eq!(record.response_reason.as_deref(), Some(TIMEOUT_REASON));
            }
            other => panic!("unexpected status {}", other),
        }
        assert_eq!(terminal_entries(&h, &subject), 1, "round {}", round);
    }
}

#[tokio::test]
async fn repeated_sweeps_expire_each_request_once() {
    let h = Harness::new().await;
    for subject in ["orders", "payments", "ledger"] {
        h.gate
            .request_approval(gated(subject, Duration::from_millis(10)))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(30)).await;

    let (first, second) = tokio::join!(h.gate.sweep_expired(), h.gate.sweep_expired());
    assert_eq!(first.unwrap() + second.unwrap(), 3);
    assert_eq!(h.gate.sweep_expired().await.unwrap(), 0);

    let expired: Vec<_> = h
        .audit
        .entries()
        .into_iter()
        .filter(|e| e.event == AuditEvent::ApprovalExpired)
        .collect();
    assert_eq!(expired.len(), 3);
    assert!(expired.iter().all(|e| e.actor == "system"));

    for subject in ["orders", "payments", "ledger"] {
        let record = h.gate.get(&subject.into()).await.unwrap();
        assert_eq!(record.status, ApprovalStatus::Expired);
        assert_eq!(record.response_reason.as_deref(), Some(TIMEOUT_REASON));
    }
}
