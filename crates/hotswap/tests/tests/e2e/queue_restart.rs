//! Execution queue shutdown and restart.
//!
//! Jobs accepted before a shutdown are never lost: the backlog stays
//! Queued, a cancelled in-flight job goes back to the queue, and a queue
//! started on the same store picks everything up in order.

use hotswap_audit::AuditEvent;
use hotswap_queue::QueueError;
use hotswap_store::JobStore;
use hotswap_tests::{GatedExecutor, Harness, RecordingExecutor};
use hotswap_types::{ExecutionJob, JobStatus, SubjectId};
use std::time::Duration;

fn job(subject: &str) -> ExecutionJob {
    ExecutionJob::new(SubjectId::new(subject), serde_json::json!({ "artifact": subject }))
}

#[tokio::test]
async fn forced_shutdown_keeps_every_job_for_next_start() {
    let executor = GatedExecutor::new();
    let first = Harness::builder().executor(executor.clone()).build().await;

    let mut ids = Vec::new();
    for subject in ["orders", "payments", "ledger"] {
        ids.push(first.queue.enqueue(job(subject)).await.unwrap());
    }
    executor.started().await;

    let report = first.queue.shutdown(Duration::from_millis(20)).await.unwrap();
    assert!(report.forced);
    assert_eq!(report.still_queued, 3);
    assert!(matches!(
        first.queue.enqueue(job("late")).await,
        Err(QueueError::ShuttingDown)
    ));

    // The interrupted job kept its place at the head of the queue
    let requeued = first.queue.job(&ids[0]).await.unwrap().unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(requeued.attempts, 1);
    assert!(first
        .audit
        .entries()
        .iter()
        .any(|e| e.event == AuditEvent::JobRequeued));

    let recorder = RecordingExecutor::new();
    let second = Harness::builder()
        .store(first.store.clone())
        .executor(recorder.clone())
        .build()
        .await;

    for id in &ids {
        second.wait_for_job(*id, JobStatus::Succeeded).await;
    }
    assert_eq!(recorder.ran(), ids);

    let retried = second.queue.job(&ids[0]).await.unwrap().unwrap();
    assert_eq!(retried.attempts, 2);
}

#[tokio::test]
async fn graceful_shutdown_lets_in_flight_job_finish() {
    let executor = GatedExecutor::new();
    let h = Harness::builder().executor(executor.clone()).build().await;

    let id = h.queue.enqueue(job("orders")).await.unwrap();
    executor.started().await;

    let shutdown = {
        let queue = h.queue.clone();
        tokio::spawn(async move { queue.shutdown(Duration::from_secs(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!h.queue.is_accepting());
    executor.release();

    let report = shutdown.await.unwrap().unwrap();
    assert!(!report.forced);
    assert_eq!(report.processed, 1);
    assert_eq!(report.still_queued, 0);

    let finished = h.queue.job(&id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn start_recovers_job_left_running_by_crash() {
    let first = Harness::builder()
        .executor(GatedExecutor::new())
        .build()
        .await;
    first.queue.shutdown(Duration::from_millis(10)).await.unwrap();

    // Simulate a process that claimed a job and died mid-run
    let id = first.store.insert_job(job("orders")).await.unwrap().id;
    let claimed = first.store.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, JobStatus::Running);

    let second = Harness::builder().store(first.store.clone()).build().await;
    let done = second.wait_for_job(id, JobStatus::Succeeded).await;
    assert_eq!(done.attempts, 2);

    let requeued: Vec<_> = second
        .audit
        .entries()
        .into_iter()
        .filter(|e| e.event == AuditEvent::JobRequeued)
        .collect();
    assert_eq!(requeued.len(), 1);
    assert_eq!(requeued[0].reason(), Some("interrupted by restart"));
}
