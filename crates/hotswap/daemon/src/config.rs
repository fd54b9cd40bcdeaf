//! Configuration for hotswapd

use crate::error::DaemonResult;
use hotswap_approval::GateConfig;
use hotswap_classifier::ClassifierPolicy;
use hotswap_orchestrator::OrchestratorConfig;
use hotswap_queue::QueueConfig;
use hotswap_types::ApprovalLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Approval gate configuration
    #[serde(default)]
    pub gate: GateSection,

    /// Execution queue configuration
    #[serde(default)]
    pub queue: QueueSection,

    /// Expiry sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperSection,

    /// Classification policy
    #[serde(default)]
    pub classifier: ClassifierPolicy,

    /// Audit sink configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Approval gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSection {
    /// First storage poll delay while waiting, in milliseconds
    #[serde(default = "default_poll_initial_ms")]
    pub poll_initial_ms: u64,

    /// Maximum storage poll delay, in milliseconds
    #[serde(default = "default_poll_max_ms")]
    pub poll_max_ms: u64,

    /// Longest approval timeout a request may ask for, in seconds
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,

    /// Approval timeout used when a submission sets none, in seconds
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Allow requesters to approve their own changes
    #[serde(default)]
    pub allow_self_approval: bool,

    /// Level from which requests must name approvers
    #[serde(default = "default_named_approvers_at")]
    pub require_named_approvers_at: Option<ApprovalLevel>,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            poll_initial_ms: default_poll_initial_ms(),
            poll_max_ms: default_poll_max_ms(),
            max_timeout_secs: default_max_timeout_secs(),
            default_timeout_secs: default_timeout_secs(),
            allow_self_approval: false,
            require_named_approvers_at: default_named_approvers_at(),
        }
    }
}

impl GateSection {
    pub fn to_gate_config(&self) -> GateConfig {
        // A zero interval would turn the waiter fallback into a busy loop
        let poll_initial_ms = self.poll_initial_ms.max(1);
        GateConfig {
            poll_initial: Duration::from_millis(poll_initial_ms),
            poll_max: Duration::from_millis(self.poll_max_ms.max(poll_initial_ms)),
            max_timeout: Duration::from_secs(self.max_timeout_secs),
            allow_self_approval: self.allow_self_approval,
            require_named_approvers_at: self.require_named_approvers_at,
            ..GateConfig::default()
        }
    }

    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            default_timeout: Duration::from_secs(self.default_timeout_secs),
        }
    }
}

/// Execution queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    /// Time the in-flight job gets to finish on shutdown, in seconds
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Job event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Idle re-check interval, in milliseconds
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: default_shutdown_grace_secs(),
            event_capacity: default_event_capacity(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

impl QueueSection {
    pub fn to_queue_config(&self) -> QueueConfig {
        QueueConfig {
            event_capacity: self.event_capacity,
            idle_poll: Duration::from_millis(self.idle_poll_ms.max(1)),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Expiry sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperSection {
    /// Sweep interval in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SweeperSection {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SweeperSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Audit sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuditConfig {
    /// In-memory audit trail (for development/testing)
    #[default]
    Memory,

    /// Append-only JSON-lines file
    File {
        /// Log file path
        path: PathBuf,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_poll_initial_ms() -> u64 {
    50
}

fn default_poll_max_ms() -> u64 {
    2_000
}

fn default_max_timeout_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_timeout_secs() -> u64 {
    24 * 60 * 60
}

fn default_named_approvers_at() -> Option<ApprovalLevel> {
    Some(ApprovalLevel::Critical)
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    256
}

fn default_idle_poll_ms() -> u64 {
    1_000
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `HOTSWAP_`-prefixed environment variables (`HOTSWAP_GATE__MAX_TIMEOUT_SECS`).
    pub fn load(path: Option<&str>) -> DaemonResult<Self> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Field names contain underscores, so sections are split on "__"
        builder = builder.add_source(
            config::Environment::with_prefix("HOTSWAP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}
