//! The job message envelope and the descriptors that place it on a queue.

use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{CorrelationId, JobId};

/// Errors converting a business payload to or from envelope text.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Failed to encode job payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode job payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// The unit placed on the queue.
///
/// `data` is the JSON text of the business payload. The envelope is never
/// mutated after the producer builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub correlation_id: CorrelationId,
    pub data: String,
}

impl JobMessage {
    /// Wrap already-serialized payload text.
    pub fn new(correlation_id: CorrelationId, data: impl Into<String>) -> Self {
        Self {
            correlation_id,
            data: data.into(),
        }
    }

    /// Serialize `payload` to JSON text and wrap it.
    pub fn encode<P: Serialize + ?Sized>(
        correlation_id: CorrelationId,
        payload: &P,
    ) -> Result<Self, EnvelopeError> {
        let data = serde_json::to_string(payload).map_err(EnvelopeError::Encode)?;
        Ok(Self::new(correlation_id, data))
    }

    /// Parse `data` back into the business payload type.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, EnvelopeError> {
        serde_json::from_str(&self.data).map_err(EnvelopeError::Decode)
    }
}

/// Where and under which id a job was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub queue_name: String,
    pub job_id: JobId,
    pub job_display_name: String,
}

impl JobDescriptor {
    pub fn new(
        queue_name: impl Into<String>,
        correlation_id: CorrelationId,
        job_display_name: impl Into<String>,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            job_id: correlation_id.into(),
            job_display_name: job_display_name.into(),
        }
    }
}

/// Job-level options passed alongside a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Id the broker deduplicates on.
    pub job_id: JobId,
    /// Display name recorded with the job.
    pub name: Option<String>,
    /// Overrides the queue's `max_attempts` for this job.
    pub attempts: Option<u32>,
    /// Do not deliver before this much time has passed.
    pub delay: Option<Duration>,
}

impl JobOptions {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            name: None,
            attempts: None,
            delay: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
