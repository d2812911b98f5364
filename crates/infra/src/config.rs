//! Worker configuration.

use std::time::Duration;

/// Ledger worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Thread name, also used as the `worker` field in logs
    pub name: String,
    /// Bounded queue size; producers block once it is full
    pub queue_capacity: usize,
    /// How often the loop re-checks for cancellation while the queue is idle
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "ledger-worker".to_string(),
            queue_capacity: 1024,
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
