use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use broker::{
    BrokerError, JobSpec, JobTrigger, QueueClient, SubmitFuture, SubmitReceipt,
    TriggerJobParameters, TriggerJobService,
};
use dispatch_core::{CorrelationId, JobId, JobMessage, JobOptions, StatusCode};
use serde::Serialize;

/// Records every submission instead of queueing it.
#[derive(Default)]
struct RecordingClient {
    submitted: Mutex<Vec<(String, JobOptions, JobMessage)>>,
}

impl RecordingClient {
    fn submitted(&self) -> Vec<(String, JobOptions, JobMessage)> {
        self.submitted.lock().unwrap().clone()
    }
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

struct UnavailableClient;

impl QueueClient for UnavailableClient {
    fn submit<'a>(
        &'a self,
        _queue_name: &'a str,
        _options: JobOptions,
        _message: JobMessage,
    ) -> SubmitFuture<'a> {
        Box::pin(async { Err(BrokerError::Unavailable("connection refused".to_string())) })
    }
}

struct PanickingClient;

impl QueueClient for PanickingClient {
    fn submit<'a>(
        &'a self,
        _queue_name: &'a str,
        _options: JobOptions,
        _message: JobMessage,
    ) -> SubmitFuture<'a> {
        Box::pin(async {
            if true {
                panic!("client blew up");
            }
            Err(BrokerError::Timeout)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct FooRequest {
    foo: String,
}

fn foo() -> FooRequest {
    FooRequest {
        foo: "bar".to_string(),
    }
}

fn demo_job(client: Arc<dyn QueueClient>) -> JobSpec {
    JobSpec::new(JobTrigger::new(client, "demo-job-queue"), "JOB:demo-job-queue")
}

#[tokio::test]
async fn missing_params_are_rejected_before_submitting() {
    let client = Arc::new(RecordingClient::default());
    let service = TriggerJobService::new();

    let error = service
        .handle::<FooRequest>(None)
        .await
        .unwrap_err();
    assert_eq!(error.status_code, StatusCode::BadRequest);
    assert_eq!(error.message, "params is null");

    let error = service
        .handle::<FooRequest>(Some(TriggerJobParameters {
            request: None,
            job: Some(demo_job(client.clone())),
        }))
        .await
        .unwrap_err();
    assert_eq!(error.status_code, StatusCode::BadRequest);
    assert_eq!(error.message, "params.request is null");

    let error = service
        .handle(Some(TriggerJobParameters {
            request: Some(foo()),
            job: None,
        }))
        .await
        .unwrap_err();
    assert_eq!(error.status_code, StatusCode::BadRequest);
    assert_eq!(error.message, "params.job is null");

    assert!(client.submitted().is_empty());
}

#[tokio::test]
async fn request_is_submitted_as_envelope() {
    let client = Arc::new(RecordingClient::default());

    let descriptor = TriggerJobService::new()
        .handle(Some(TriggerJobParameters::new(foo(), demo_job(client.clone()))))
        .await
        .unwrap();

    assert_eq!(descriptor.queue_name, "demo-job-queue");
    assert_eq!(descriptor.job_display_name, "JOB:demo-job-queue");

    let submitted = client.submitted();
    assert_eq!(submitted.len(), 1);
    let (queue_name, options, message) = &submitted[0];
    assert_eq!(queue_name, "demo-job-queue");
    assert_eq!(options.job_id, descriptor.job_id);
    assert_eq!(options.name.as_deref(), Some("JOB:demo-job-queue"));
    assert_eq!(JobId::from(message.correlation_id), descriptor.job_id);
    assert_eq!(message.data, r#"{"foo":"bar"}"#);
}

#[tokio::test]
async fn caller_supplied_id_and_options_are_kept() {
    let client = Arc::new(RecordingClient::default());
    let id = CorrelationId::new();

    let descriptor = TriggerJobService::new()
        .handle(Some(TriggerJobParameters::new(
            foo(),
            demo_job(client.clone())
                .with_id(id)
                .with_attempts(5)
                .with_delay(std::time::Duration::from_secs(2)),
        )))
        .await
        .unwrap();
    assert_eq!(descriptor.job_id, JobId::from(id));

    let (_, options, message) = &client.submitted()[0];
    assert_eq!(message.correlation_id, id);
    assert_eq!(options.attempts, Some(5));
    assert_eq!(options.delay, Some(std::time::Duration::from_secs(2)));
}

#[tokio::test]
async fn each_trigger_gets_a_fresh_id() {
    let client = Arc::new(RecordingClient::default());
    let service = TriggerJobService::new();

    let first = service
        .handle(Some(TriggerJobParameters::new(foo(), demo_job(client.clone()))))
        .await
        .unwrap();
    let second = service
        .handle(Some(TriggerJobParameters::new(foo(), demo_job(client.clone()))))
        .await
        .unwrap();
    assert_ne!(first.job_id, second.job_id);
}

#[tokio::test]
async fn broker_failure_is_internal_error() {
    let error = TriggerJobService::new()
        .handle(Some(TriggerJobParameters::new(
            foo(),
            demo_job(Arc::new(UnavailableClient)),
        )))
        .await
        .unwrap_err();

    assert_eq!(error.status_code, StatusCode::InternalServerError);
    assert!(error.message.contains("connection refused"));
}

#[tokio::test]
async fn panic_while_submitting_is_internal_error() {
    let error = TriggerJobService::new()
        .handle(Some(TriggerJobParameters::new(
            foo(),
            demo_job(Arc::new(PanickingClient)),
        )))
        .await
        .unwrap_err();

    assert_eq!(error.status_code, StatusCode::InternalServerError);
    assert_eq!(error.message, "client blew up");
}

#[tokio::test]
async fn unserializable_request_is_internal_error() {
    let client = Arc::new(RecordingClient::default());
    // JSON object keys must be strings.
    let request: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);

    let error = TriggerJobService::new()
        .handle(Some(TriggerJobParameters::new(request, demo_job(client.clone()))))
        .await
        .unwrap_err();

    assert_eq!(error.status_code, StatusCode::InternalServerError);
    assert!(client.submitted().is_empty());
}
