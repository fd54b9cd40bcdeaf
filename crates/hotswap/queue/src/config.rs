//! Execution queue configuration

use std::time::Duration;

/// Configuration for the execution queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Capacity of the job event broadcast channel.
    pub event_capacity: usize,

    /// How often an idle worker re-checks the store for jobs it was not
    /// woken for.
    pub idle_poll: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            idle_poll: Duration::from_secs(1),
        }
    }
}
