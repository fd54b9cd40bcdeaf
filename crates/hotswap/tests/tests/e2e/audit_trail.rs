//! Audit trail integrity across a full governed flow and across restarts.

use hotswap_approval::{ApprovalGate, GateConfig, NewApproval};
use hotswap_audit::{verify_chain, AuditEvent, ChainViolation, FileAuditSink};
use hotswap_classifier::ChangeClassifier;
use hotswap_orchestrator::Submission;
use hotswap_store::InMemoryStore;
use hotswap_tests::{module_change, Harness};
use hotswap_types::{JobStatus, RiskTier, Verdict};
use std::sync::Arc;
use std::time::Duration;

async fn file_gate(path: &std::path::Path, store: Arc<InMemoryStore>) -> (ApprovalGate, Arc<FileAuditSink>) {
    let audit = Arc::new(FileAuditSink::open(path).await.unwrap());
    let gate = ApprovalGate::new(
        store,
        audit.clone(),
        ChangeClassifier::default(),
        GateConfig::default(),
    );
    (gate, audit)
}

fn gated(subject: &str) -> NewApproval {
    NewApproval::new(
        module_change(subject, RiskTier::High),
        "dev@x.com",
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn governed_flow_leaves_intact_chain() {
    let h = Harness::new().await;
    h.orchestrator
        .submit(Submission::new(module_change("orders", RiskTier::High), "dev@x.com"))
        .await
        .unwrap();
    h.orchestrator
        .submit(Submission::new(module_change("payments", RiskTier::Low), "dev@x.com"))
        .await
        .unwrap();
    h.gate
        .decide(&"orders".into(), "lead@x.com", Verdict::Approve, None)
        .await
        .unwrap();
    h.wait_for_subject_job("orders", JobStatus::Succeeded).await;
    h.wait_for_subject_job("payments", JobStatus::Succeeded).await;

    let entries = h.audit.entries();
    let verification = verify_chain(&entries);
    assert!(verification.is_valid());
    assert_eq!(verification.verified_entries, entries.len());
    assert!(entries[0].previous_hash.is_none());
}

#[tokio::test]
async fn file_trail_survives_reopen_and_detects_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit").join("trail.jsonl");
    let store = Arc::new(InMemoryStore::new());

    {
        let (gate, _) = file_gate(&path, store.clone()).await;
        gate.request_approval(gated("orders")).await.unwrap();
        gate.decide(&"orders".into(), "lead@x.com", Verdict::Approve, None)
            .await
            .unwrap();
    }

    // A restarted process continues the same chain
    let (gate, audit) = file_gate(&path, store).await;
    gate.request_approval(gated("payments")).await.unwrap();
    gate.decide(
        &"payments".into(),
        "lead@x.com",
        Verdict::Reject,
        Some("missing rollback plan".into()),
    )
    .await
    .unwrap();

    let entries = audit.read_all().await.unwrap();
    let events: Vec<_> = entries.iter().map(|e| e.event).collect();
    assert_eq!(
        events,
        vec![
            AuditEvent::ApprovalRequested,
            AuditEvent::ApprovalGranted,
            AuditEvent::ApprovalRequested,
            AuditEvent::ApprovalRejected,
        ]
    );
    assert!(verify_chain(&entries).is_valid());
    assert_eq!(entries[2].previous_hash.as_deref(), Some(entries[1].entry_hash.as_str()));

    // Rewrite who approved the first change
    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
    lines[1] = lines[1].replace("lead@x.com", "mallory@x.com");
    tokio::fs::write(&path, lines.join("\n") + "\n").await.unwrap();

    let tampered = audit.read_all().await.unwrap();
    let verification = verify_chain(&tampered);
    assert!(!verification.is_valid());
    assert_eq!(verification.verified_entries, 1);
    assert!(matches!(
        verification.violation,
        Some(ChainViolation::TamperedEntry { index: 1, .. })
    ));
}
