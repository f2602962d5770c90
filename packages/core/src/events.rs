//! Lifecycle events emitted by the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Events emitted by queues and workers.
///
/// These are observability signals; retry control flow never depends on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    // Job events
    /// A job was accepted onto a queue.
    JobSubmitted {
        job_id: JobId,
        queue_name: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delayed_until: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },
    /// A submission reused a known job id and was not enqueued again.
    JobDeduplicated {
        job_id: JobId,
        queue_name: String,
        timestamp: DateTime<Utc>,
    },
    /// A job was delivered to a worker.
    JobStarted {
        job_id: JobId,
        queue_name: String,
        worker_id: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    /// A delivery completed successfully.
    JobCompleted {
        job_id: JobId,
        queue_name: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A delivery failed.
    JobFailed {
        job_id: JobId,
        queue_name: String,
        error: String,
        attempts: u32,
        will_retry: bool,
        timestamp: DateTime<Utc>,
    },
    /// A failed job was scheduled for another attempt.
    JobRetrying {
        job_id: JobId,
        queue_name: String,
        attempt: u32,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job failed for good and was moved to the dead-letter record.
    JobDeadLettered {
        job_id: JobId,
        queue_name: String,
        error: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    // Worker events
    /// A worker attached to a queue.
    WorkerConnected {
        worker_id: String,
        queue_name: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker detached from a queue.
    WorkerDisconnected {
        worker_id: String,
        queue_name: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the queue this event belongs to.
    pub fn queue_name(&self) -> &str {
        match self {
            JobEvent::JobSubmitted { queue_name, .. }
            | JobEvent::JobDeduplicated { queue_name, .. }
            | JobEvent::JobStarted { queue_name, .. }
            | JobEvent::JobCompleted { queue_name, .. }
            | JobEvent::JobFailed { queue_name, .. }
            | JobEvent::JobRetrying { queue_name, .. }
            | JobEvent::JobDeadLettered { queue_name, .. }
            | JobEvent::WorkerConnected { queue_name, .. }
            | JobEvent::WorkerDisconnected { queue_name, .. } => queue_name,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::JobSubmitted { job_id, .. }
            | JobEvent::JobDeduplicated { job_id, .. }
            | JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. }
            | JobEvent::JobRetrying { job_id, .. }
            | JobEvent::JobDeadLettered { job_id, .. } => Some(*job_id),
            JobEvent::WorkerConnected { .. } | JobEvent::WorkerDisconnected { .. } => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobSubmitted {
                job_id, queue_name, ..
            } => format!("Job {} submitted to {}", job_id, queue_name),
            JobEvent::JobDeduplicated { job_id, .. } => {
                format!("Job {} already known, submission ignored", job_id)
            }
            JobEvent::JobStarted {
                job_id,
                worker_id,
                attempt,
                ..
            } => format!("Job {} started by {} (attempt {})", job_id, worker_id, attempt),
            JobEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            JobEvent::JobFailed {
                job_id,
                error,
                will_retry,
                ..
            } => {
                let retry = if *will_retry { " (will retry)" } else { "" };
                format!("Job {} failed: {}{}", job_id, error, retry)
            }
            JobEvent::JobRetrying {
                job_id,
                attempt,
                delay_ms,
                ..
            } => format!("Job {} retrying (attempt {}) in {}ms", job_id, attempt, delay_ms),
            JobEvent::JobDeadLettered {
                job_id, attempts, ..
            } => format!("Job {} dead-lettered after {} attempts", job_id, attempts),
            JobEvent::WorkerConnected {
                worker_id,
                queue_name,
                ..
            } => format!("Worker {} connected to {}", worker_id, queue_name),
            JobEvent::WorkerDisconnected {
                worker_id,
                queue_name,
                ..
            } => format!("Worker {} disconnected from {}", worker_id, queue_name),
        }
    }
}
