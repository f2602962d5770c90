//! Queued job record, as held by the broker and persisted by the database.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, JobMessage};

/// Where a job is in its broker-side lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Ready to be delivered.
    #[default]
    Waiting,
    /// Not deliverable before `until`.
    Delayed { until: DateTime<Utc> },
    /// Delivered to a worker, awaiting acknowledgement.
    Active {
        started_at: DateTime<Utc>,
        worker_id: String,
    },
    /// Acknowledged by a worker.
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Out of attempts, or failed fatally.
    Failed {
        failed_at: DateTime<Utc>,
        error: String,
    },
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Delayed { .. } => "delayed",
            JobStatus::Active { .. } => "active",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// A job placed on a named queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue_name: String,
    /// Display name given at trigger time.
    pub name: String,
    /// The envelope, exactly as submitted.
    pub message: JobMessage,
    pub status: JobStatus,
    /// Deliveries so far.
    #[serde(default)]
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest delivery time.
    pub run_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new waiting job.
    pub fn new(
        id: JobId,
        queue_name: impl Into<String>,
        name: impl Into<String>,
        message: JobMessage,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            queue_name: queue_name.into(),
            name: name.into(),
            message,
            status: JobStatus::Waiting,
            attempts: 0,
            max_attempts: 3,
            run_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Hold the job back for `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        let created_at = self.created_at;
        self.reschedule(created_at, delay)
    }

    /// Make the job deliverable again `delay` after `now`.
    pub fn reschedule(mut self, now: DateTime<Utc>, delay: Duration) -> Self {
        if delay.is_zero() {
            self.run_at = now;
            self.status = JobStatus::Waiting;
        } else {
            let until = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|delay| now.checked_add_signed(delay))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.run_at = until;
            self.status = JobStatus::Delayed { until };
        }
        self
    }

    /// Deliverable at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && !matches!(self.status, JobStatus::Active { .. }) && self.run_at <= now
    }

    /// Another delivery is allowed after a retryable failure.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}
