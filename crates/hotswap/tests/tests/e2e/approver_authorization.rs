//! Who may decide a request.

use hotswap_approval::{ApprovalError, NewApproval};
use hotswap_audit::AuditEvent;
use hotswap_orchestrator::{OrchestratorError, Submission};
use hotswap_tests::{module_change, Harness};
use hotswap_types::{ApprovalStatus, RiskTier, SubjectId, Verdict};
use std::time::Duration;

#[tokio::test]
async fn outsider_cannot_decide_named_request() {
    let h = Harness::new().await;
    let subject = SubjectId::new("orders");
    h.gate
        .request_approval(
            NewApproval::new(
                module_change("orders", RiskTier::High),
                "dev@x.com",
                Duration::from_secs(60),
            )
            .with_approvers(["a@x.com"]),
        )
        .await
        .unwrap();

    let err = h
        .gate
        .decide(&subject, "b@x.com", Verdict::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::Unauthorized { ref actor, .. } if actor == "b@x.com"));
    assert_eq!(
        h.gate.get(&subject).await.unwrap().status,
        ApprovalStatus::Pending
    );

    let record = h
        .gate
        .decide(&subject, "a@x.com", Verdict::Approve, None)
        .await
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Approved);
    assert_eq!(record.responded_by.as_deref(), Some("a@x.com"));

    let granted: Vec<_> = h
        .audit
        .entries_for(&subject)
        .into_iter()
        .filter(|e| e.event == AuditEvent::ApprovalGranted)
        .collect();
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].actor, "a@x.com");
}

#[tokio::test]
async fn critical_change_must_name_approvers() {
    let h = Harness::new().await;

    let err = h
        .orchestrator
        .submit(Submission::new(
            module_change("ledger", RiskTier::Critical),
            "dev@x.com",
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Approval(ApprovalError::ValidationFailed(_))
    ));
    assert!(h.audit.entries().is_empty());

    let outcome = h
        .orchestrator
        .submit(
            Submission::new(module_change("ledger", RiskTier::Critical), "dev@x.com")
                .with_approvers(["cto@x.com", "sre@x.com"]),
        )
        .await
        .unwrap();
    assert_eq!(outcome.approval().status, ApprovalStatus::Pending);
    assert_eq!(outcome.approval().approvers, vec!["cto@x.com", "sre@x.com"]);
}

#[tokio::test]
async fn requester_cannot_list_themselves() {
    let h = Harness::new().await;
    let err = h
        .gate
        .request_approval(
            NewApproval::new(
                module_change("orders", RiskTier::High),
                "dev@x.com",
                Duration::from_secs(60),
            )
            .with_approvers(["dev@x.com", "lead@x.com"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::ValidationFailed(_)));
}
