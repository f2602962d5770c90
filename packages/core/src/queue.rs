//! Queue configuration and statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential retry backoff: `base_ms * 2^(attempt - 1)`, capped at `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 86_400_000, // 24 hours
        }
    }
}

impl BackoffPolicy {
    /// No waiting between attempts.
    pub fn immediate() -> Self {
        Self { base_ms: 0, max_ms: 0 }
    }

    /// Delay before the next attempt after `attempts` failed ones.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let factor = 2u64.saturating_pow(exponent);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
    }
}

/// Configuration for queue behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of deliveries processed at once by one worker handle.
    pub concurrency: u32,
    /// Delivery attempts before a job is dead-lettered.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
    /// Per-delivery execution timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// How long an idle worker waits before polling again.
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            timeout_secs: None,
            poll_interval_ms: 100,
        }
    }
}

impl QueueConfig {
    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Statistics for a queue's current state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Ready for delivery.
    pub waiting: u64,
    /// Scheduled for later (delayed submission or retry backoff).
    pub delayed: u64,
    /// Handed to a worker and not yet acknowledged.
    pub active: u64,
    /// Completed since the queue started.
    pub completed: u64,
    /// Dead-lettered since the queue started.
    pub failed: u64,
}

impl QueueStats {
    /// Jobs not yet in a terminal state.
    pub fn outstanding(&self) -> u64 {
        self.waiting + self.delayed + self.active
    }
}
