//! The submission seam between producers and the broker.

use std::future::Future;
use std::pin::Pin;

use dispatch_core::{JobId, JobMessage, JobOptions};
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

/// Broker acknowledgement of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    /// The id was already known; nothing new was enqueued.
    pub deduplicated: bool,
}

pub type SubmitFuture<'a> = Pin<Box<dyn Future<Output = Result<SubmitReceipt, BrokerError>> + Send + 'a>>;

/// Places envelopes on named queues.
///
/// One client is opened per process and shared by every trigger call.
pub trait QueueClient: Send + Sync {
    /// Submit `message` to `queue_name`, resolving once the broker has
    /// accepted it.
    fn submit<'a>(
        &'a self,
        queue_name: &'a str,
        options: JobOptions,
        message: JobMessage,
    ) -> SubmitFuture<'a>;
}
