//! Trigger-job service: request payload in, queued job out.

use std::time::Duration;

use dispatch_core::{
    CorrelationId, JobDescriptor, JobMessage, JobOptions, ResultError, ServiceResult,
    try_catch_result,
};
use serde::Serialize;

use crate::trigger::JobTrigger;

/// Where and how to place the job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub trigger: JobTrigger,
    /// Display name of the job.
    pub name: String,
    /// Correlation id to use; a fresh one is minted when absent.
    pub id: Option<CorrelationId>,
    /// Delivery attempts; the queue default applies when absent.
    pub attempts: Option<u32>,
    /// Hold the job back for this long.
    pub delay: Option<Duration>,
}

impl JobSpec {
    pub fn new(trigger: JobTrigger, name: impl Into<String>) -> Self {
        Self {
            trigger,
            name: name.into(),
            id: None,
            attempts: None,
            delay: None,
        }
    }

    pub fn with_id(mut self, id: CorrelationId) -> Self {
        self.id = Some(id);
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

/// Input of [`TriggerJobService::handle`].
#[derive(Debug, Clone)]
pub struct TriggerJobParameters<R> {
    pub request: Option<R>,
    pub job: Option<JobSpec>,
}

impl<R> TriggerJobParameters<R> {
    pub fn new(request: R, job: JobSpec) -> Self {
        Self {
            request: Some(request),
            job: Some(job),
        }
    }
}

/// Serializes a request into a job envelope and submits it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerJobService;

impl TriggerJobService {
    pub fn new() -> Self {
        Self
    }

    /// Submit `params.request` to the queue named by `params.job`.
    ///
    /// Missing parameters are `400` failures and nothing is submitted.
    /// Serialization and broker failures come back as `500` failures.
    pub async fn handle<R: Serialize>(
        &self,
        params: Option<TriggerJobParameters<R>>,
    ) -> ServiceResult<JobDescriptor> {
        try_catch_result(async move {
            // Guard
            let Some(params) = params else {
                return Err(ResultError::bad_request("params is null"));
            };
            let Some(request) = params.request else {
                return Err(ResultError::bad_request("params.request is null"));
            };
            let Some(job) = params.job else {
                return Err(ResultError::bad_request("params.job is null"));
            };

            let correlation_id = job.id.unwrap_or_else(CorrelationId::new);
            let message = JobMessage::encode(correlation_id, &request)?;

            let mut options = JobOptions::new(correlation_id.into());
            if let Some(attempts) = job.attempts {
                options = options.with_attempts(attempts);
            }
            if let Some(delay) = job.delay {
                options = options.with_delay(delay);
            }

            job.trigger.trigger(&job.name, options, message).await?;

            Ok::<_, ResultError>(JobDescriptor::new(
                job.trigger.queue_name(),
                correlation_id,
                job.name,
            ))
        })
        .await
    }
}
