//! Approval gate configuration

use hotswap_types::ApprovalLevel;
use std::time::Duration;

/// Configuration for the approval gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// First storage poll delay while waiting for a decision.
    pub poll_initial: Duration,

    /// Upper bound on the poll delay.
    pub poll_max: Duration,

    /// Multiplier applied to the poll delay after each empty poll.
    pub poll_factor: u32,

    /// Longest timeout a request may ask for.
    pub max_timeout: Duration,

    /// Whether a requester may also appear as an approver.
    pub allow_self_approval: bool,

    /// From this level up, requests must name their approvers.
    pub require_named_approvers_at: Option<ApprovalLevel>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_initial: Duration::from_millis(50),
            poll_max: Duration::from_secs(2),
            poll_factor: 2,
            max_timeout: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            allow_self_approval: false,
            require_named_approvers_at: Some(ApprovalLevel::Critical),
        }
    }
}

impl GateConfig {
    /// Next poll delay after `current`
    pub(crate) fn next_poll(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.poll_factor.max(1))
            .min(self.poll_max)
    }
}
