//! Periodic expiry sweep

use crate::gate::ApprovalGate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Background task that expires overdue requests on an interval.
///
/// Covers requests nobody is waiting on, including those left behind by a
/// process that exited mid-wait.
pub struct Sweeper {
    gate: Arc<ApprovalGate>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(gate: Arc<ApprovalGate>, interval: Duration) -> Self {
        Self { gate, interval }
    }

    /// Run the sweep loop on its own task until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Approval sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.gate.sweep_expired().await {
                        Ok(0) => {}
                        Ok(count) => tracing::debug!(count, "Sweep expired requests"),
                        Err(e) => tracing::error!(error = %e, "Approval sweep failed"),
                    }
                }
            }
        }

        tracing::info!("Approval sweeper stopped");
    }
}
