//! Command handler behind `POST /api/v1/demo`.

use std::convert::Infallible;
use std::sync::Arc;

use broker::{JobSpec, JobTrigger, QueueClient, TriggerJobParameters, TriggerJobService};
use dispatch_core::{CorrelationId, DataResponse, JobId, StatusCode};
use pipeline::PipelineWorkflow;

use crate::contracts::{DemoJobRequest, TriggerDemoJobResponse};
use crate::{DEMO_JOB_QUEUE, demo_job_name};

/// Pipeline step names.
mod steps {
    pub const TRIGGER_JOB: &str = "triggerJob";
    pub const RESPONSE: &str = "response";
}

/// Request to place one demo job on the queue.
#[derive(Debug, Clone)]
pub struct TriggerDemoJobCommand {
    pub request: Option<DemoJobRequest>,
}

impl TriggerDemoJobCommand {
    pub fn new(request: DemoJobRequest) -> Self {
        Self {
            request: Some(request),
        }
    }
}

/// Runs the `triggerJob` and `response` steps for one command.
#[derive(Clone)]
pub struct TriggerDemoJobHandler {
    trigger: JobTrigger,
    service: TriggerJobService,
}

impl TriggerDemoJobHandler {
    pub fn new(client: Arc<dyn QueueClient>) -> Self {
        Self {
            trigger: JobTrigger::new(client, DEMO_JOB_QUEUE),
            service: TriggerJobService::new(),
        }
    }

    pub async fn handle(
        &self,
        value: Option<TriggerDemoJobCommand>,
    ) -> DataResponse<TriggerDemoJobResponse> {
        // Guard
        let Some(value) = value else {
            return DataResponse::error(StatusCode::BadRequest, "value is null");
        };
        let Some(request) = value.request else {
            return DataResponse::error(StatusCode::BadRequest, "value.request is null");
        };

        let mut pipeline = PipelineWorkflow::new();

        let triggered = pipeline
            .step(steps::TRIGGER_JOB, || async move {
                let id = CorrelationId::new();
                tracing::info!("id: {}", id);

                let job = JobSpec::new(self.trigger.clone(), demo_job_name()).with_id(id);
                self.service
                    .handle(Some(TriggerJobParameters::new(request, job)))
                    .await
            })
            .await;
        let descriptor = match triggered {
            Ok(descriptor) => descriptor,
            Err(exception) => return DataResponse::pipeline_error(exception.into_error()),
        };

        let job_id: JobId = descriptor.job_id;
        match pipeline
            .step(steps::RESPONSE, || async move {
                Ok::<_, Infallible>(TriggerDemoJobResponse::new(job_id))
            })
            .await
        {
            Ok(response) => DataResponse::success(StatusCode::Ok, response),
            Err(exception) => DataResponse::pipeline_error(exception.into_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::{BrokerError, SubmitFuture, SubmitReceipt};
    use dispatch_core::{GENERIC_ERROR_MESSAGE, JobMessage, JobOptions};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        submitted: Mutex<Vec<(String, JobOptions, JobMessage)>>,
    }

    impl QueueClient for RecordingClient {
        fn submit<'a>(
            &'a self,
            queue_name: &'a str,
            options: JobOptions,
            message: JobMessage,
        ) -> SubmitFuture<'a> {
            Box::pin(async move {
                let job_id = options.job_id;
                self.submitted
                    .lock()
                    .unwrap()
                    .push((queue_name.to_string(), options, message));
                Ok(SubmitReceipt {
                    job_id,
                    deduplicated: false,
                })
            })
        }
    }

    struct DownClient;

    impl QueueClient for DownClient {
        fn submit<'a>(
            &'a self,
            _queue_name: &'a str,
            _options: JobOptions,
            _message: JobMessage,
        ) -> SubmitFuture<'a> {
            Box::pin(async { Err(BrokerError::Unavailable("connection refused".to_string())) })
        }
    }

    #[tokio::test]
    async fn missing_command_is_bad_request() {
        let client = Arc::new(RecordingClient::default());
        let handler = TriggerDemoJobHandler::new(client.clone());

        let response = handler.handle(None).await;
        assert!(!response.success);
        assert_eq!(response.status_code, StatusCode::BadRequest);
        assert_eq!(response.message.as_deref(), Some("value is null"));

        let response = handler
            .handle(Some(TriggerDemoJobCommand { request: None }))
            .await;
        assert_eq!(response.http_status(), 400);
        assert_eq!(response.message.as_deref(), Some("value.request is null"));

        assert!(client.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_is_placed_on_demo_queue() {
        let client = Arc::new(RecordingClient::default());
        let handler = TriggerDemoJobHandler::new(client.clone());

        let response = handler
            .handle(Some(TriggerDemoJobCommand::new(
                DemoJobRequest::new().with("foo", "bar"),
            )))
            .await;

        assert!(response.success);
        assert_eq!(response.status_code, StatusCode::Ok);
        let data = response.data.unwrap();
        assert_eq!(data.message, "Trigger Job Successfully");

        let submitted = client.submitted.lock().unwrap();
        let (queue_name, options, message) = &submitted[0];
        assert_eq!(queue_name, DEMO_JOB_QUEUE);
        assert_eq!(options.name.as_deref(), Some("JOB:demo-job-queue"));
        assert_eq!(options.job_id, data.job_id);
        assert_eq!(JobId::from(message.correlation_id), data.job_id);
        assert_eq!(message.data, r#"{"foo":"bar"}"#);
    }

    #[tokio::test]
    async fn broker_failure_hides_details() {
        let handler = TriggerDemoJobHandler::new(Arc::new(DownClient));

        let response = handler
            .handle(Some(TriggerDemoJobCommand::new(DemoJobRequest::new())))
            .await;

        assert!(!response.success);
        assert_eq!(response.status_code, StatusCode::InternalServerError);
        assert_eq!(response.message.as_deref(), Some(GENERIC_ERROR_MESSAGE));
        assert!(response.data.is_none());
    }
}
