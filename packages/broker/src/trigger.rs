//! Producer side: places envelopes on one named queue.

use std::sync::Arc;

use dispatch_core::{JobMessage, JobOptions};

use crate::client::{QueueClient, SubmitReceipt};
use crate::error::BrokerError;

/// Triggers jobs on one queue through a shared [`QueueClient`].
#[derive(Clone)]
pub struct JobTrigger {
    client: Arc<dyn QueueClient>,
    queue_name: String,
}

impl JobTrigger {
    pub fn new(client: Arc<dyn QueueClient>, queue_name: impl Into<String>) -> Self {
        Self {
            client,
            queue_name: queue_name.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Submit `message` under the display name `name`.
    ///
    /// Resolves once the broker has accepted the job; the job itself runs
    /// later on a worker.
    pub async fn trigger(
        &self,
        name: &str,
        options: JobOptions,
        message: JobMessage,
    ) -> Result<SubmitReceipt, BrokerError> {
        let options = options.with_name(name);
        tracing::debug!(
            queue = %self.queue_name,
            job_id = %options.job_id,
            "Submitting {}",
            name
        );

        let receipt = self.client.submit(&self.queue_name, options, message).await?;
        if receipt.deduplicated {
            tracing::info!(job_id = %receipt.job_id, "Job {} was already queued", name);
        }
        Ok(receipt)
    }
}

impl std::fmt::Debug for JobTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTrigger")
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}
