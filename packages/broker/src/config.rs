//! Broker configuration.

use std::time::Duration;

use dispatch_core::QueueConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Upper bound for one request/reply exchange with an actor.
    pub rpc_timeout_ms: u64,
    /// Buffer of the lifecycle event channel.
    pub event_capacity: usize,
    /// Used for queues that are submitted to before anyone declares them.
    pub default_queue: QueueConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 5_000,
            event_capacity: 1_024,
            default_queue: QueueConfig::default(),
        }
    }
}

impl BrokerConfig {
    pub fn with_default_queue(mut self, config: QueueConfig) -> Self {
        self.default_queue = config;
        self
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
