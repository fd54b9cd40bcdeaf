//! Shared fixtures for the hotswap end-to-end and property tests.

use async_trait::async_trait;
use hotswap_approval::{ApprovalGate, GateConfig};
use hotswap_audit::{AuditSink, MemoryAuditSink};
use hotswap_classifier::ChangeClassifier;
use hotswap_orchestrator::{Orchestrator, OrchestratorConfig};
use hotswap_queue::{ExecutionQueue, ExecutorError, PipelineExecutor, QueueConfig};
use hotswap_store::InMemoryStore;
use hotswap_types::{
    ExecutionJob, FieldDef, FieldType, JobId, JobStatus, ProposedChange, RiskTier,
    SchemaDefinition, SubjectKind,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

/// Succeeds immediately and records the order jobs ran in.
#[derive(Default)]
pub struct RecordingExecutor {
    ran: Mutex<Vec<JobId>>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ran(&self) -> Vec<JobId> {
        self.ran.lock().clone()
    }
}

#[async_trait]
impl PipelineExecutor for RecordingExecutor {
    async fn execute(
        &self,
        job: &ExecutionJob,
        _cancel: CancellationToken,
    ) -> Result<serde_json::Value, ExecutorError> {
        self.ran.lock().push(job.id);
        Ok(serde_json::json!({ "deployed": job.subject_id.as_str() }))
    }
}

/// Blocks until released or cancelled.
#[derive(Default)]
pub struct GatedExecutor {
    release: Notify,
    started: Notify,
}

impl GatedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let the in-flight job finish
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Resolves once a job has entered the executor
    pub async fn started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl PipelineExecutor for GatedExecutor {
    async fn execute(
        &self,
        _job: &ExecutionJob,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value, ExecutorError> {
        self.started.notify_one();
        tokio::select! {
            _ = cancel.cancelled() => Err(ExecutorError::Cancelled),
            _ = self.release.notified() => Ok(serde_json::Value::Null),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Fully wired gate, queue and orchestrator over one in-memory store.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub gate: Arc<ApprovalGate>,
    pub queue: Arc<ExecutionQueue>,
    pub orchestrator: Arc<Orchestrator>,
}

pub struct HarnessBuilder {
    gate: GateConfig,
    orchestrator: OrchestratorConfig,
    executor: Arc<dyn PipelineExecutor>,
    store: Arc<InMemoryStore>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            gate: GateConfig {
                poll_initial: Duration::from_millis(5),
                poll_max: Duration::from_millis(50),
                ..GateConfig::default()
            },
            orchestrator: OrchestratorConfig::default(),
            executor: RecordingExecutor::new(),
            store: Arc::new(InMemoryStore::new()),
        }
    }
}

impl HarnessBuilder {
    pub fn gate_config(mut self, config: GateConfig) -> Self {
        self.gate = config;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.orchestrator.default_timeout = timeout;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn PipelineExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Reuse an existing store, as a restarted process would
    pub fn store(mut self, store: Arc<InMemoryStore>) -> Self {
        self.store = store;
        self
    }

    pub async fn build(self) -> Harness {
        let audit = Arc::new(MemoryAuditSink::new());
        let gate = Arc::new(ApprovalGate::new(
            self.store.clone(),
            audit.clone(),
            ChangeClassifier::default(),
            self.gate,
        ));
        let queue = ExecutionQueue::start(
            self.store.clone(),
            self.executor,
            audit.clone() as Arc<dyn AuditSink>,
            QueueConfig {
                idle_poll: Duration::from_millis(20),
                ..QueueConfig::default()
            },
        )
        .await
        .expect("queue starts");
        let orchestrator = Orchestrator::new(
            gate.clone(),
            queue.clone(),
            audit.clone(),
            self.orchestrator,
        );

        Harness {
            store: self.store,
            audit,
            gate,
            queue,
            orchestrator,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    /// Poll until the job reaches `status`
    pub async fn wait_for_job(&self, id: JobId, status: JobStatus) -> ExecutionJob {
        for _ in 0..500 {
            if let Some(job) = self.queue.job(&id).await.expect("job lookup") {
                if job.status == status {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", id, status);
    }

    /// Poll until `subject` has a job in `status`
    pub async fn wait_for_subject_job(&self, subject: &str, status: JobStatus) -> ExecutionJob {
        for _ in 0..500 {
            let jobs = self.queue.jobs(Some(status)).await.expect("job listing");
            if let Some(job) = jobs.into_iter().find(|j| j.subject_id.as_str() == subject) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never had a {} job", subject, status);
    }
}

// ---------------------------------------------------------------------------
// Changes
// ---------------------------------------------------------------------------

/// The `orders` schema at 1.0.0
pub fn orders_v1() -> SchemaDefinition {
    SchemaDefinition::new(semver::Version::new(1, 0, 0))
        .with_field("id", FieldDef::required(FieldType::String))
        .with_field("total", FieldDef::required(FieldType::Integer))
        .with_field("note", FieldDef::optional(FieldType::String))
}

/// Adds an optional field to [`orders_v1`]
pub fn orders_v1_1_compatible() -> SchemaDefinition {
    let mut schema = orders_v1().with_field("currency", FieldDef::optional(FieldType::String));
    schema.version = semver::Version::new(1, 1, 0);
    schema
}

/// Drops the required `total` field from [`orders_v1`]
pub fn orders_v2_breaking() -> SchemaDefinition {
    let mut schema = orders_v1();
    schema.fields.remove("total");
    schema.version = semver::Version::new(2, 0, 0);
    schema
}

/// A module change with a declared risk tier and a deploy payload
pub fn module_change(subject: &str, tier: RiskTier) -> ProposedChange {
    ProposedChange::with_risk(
        subject,
        SubjectKind::Module,
        semver::Version::new(2, 4, 0),
        tier,
    )
    .with_payload(serde_json::json!({ "artifact": format!("{}-2.4.0.tar.gz", subject) }))
}
