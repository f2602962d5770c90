//! One delivery of a job to a worker, and its state machine.

use serde::{Deserialize, Serialize};

use crate::{CorrelationId, Job, JobId, JobMessage};

/// Per-delivery processing state.
///
/// `Received -> Decoding -> Executing -> {Completed | Failed}`; any
/// non-terminal state may also move straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Received,
    Decoding,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid delivery transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: DeliveryState,
    pub to: DeliveryState,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Completed | DeliveryState::Failed)
    }

    pub fn can_transition_to(&self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Received, Decoding)
                | (Decoding, Executing)
                | (Executing, Completed)
                | (Received | Decoding | Executing, Failed)
        )
    }

    pub fn advance(self, next: DeliveryState) -> Result<DeliveryState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Received => "received",
            DeliveryState::Decoding => "decoding",
            DeliveryState::Executing => "executing",
            DeliveryState::Completed => "completed",
            DeliveryState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a worker receives from its queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub job_id: JobId,
    pub queue_name: String,
    pub name: String,
    /// 1-based attempt number of this delivery.
    pub attempt: u32,
    pub max_attempts: u32,
    pub message: JobMessage,
}

impl Delivery {
    /// Snapshot a job that has just been marked active.
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            queue_name: job.queue_name.clone(),
            name: job.name.clone(),
            attempt: job.attempts,
            max_attempts: job.max_attempts,
            message: job.message.clone(),
        }
    }

    pub fn context(&self) -> JobContext {
        JobContext {
            job_id: self.job_id,
            correlation_id: self.message.correlation_id,
            name: self.name.clone(),
            queue_name: self.queue_name.clone(),
            attempt: self.attempt,
        }
    }
}

/// Context passed to job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: JobId,
    pub correlation_id: CorrelationId,
    pub name: String,
    pub queue_name: String,
    pub attempt: u32,
}
