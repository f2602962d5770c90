//! Worker actor for executing deliveries.

use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dispatch_core::{Delivery, DeliveryState, InvalidTransition, JobEvent, panic_message};
use futures_util::FutureExt;
use ractor::rpc::CallResult;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::handler::JobHandler;
use crate::messages::{QueueMessage, WorkerMessage};

/// How one delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// `Completed` or `Failed`.
    pub state: DeliveryState,
    /// Stage that was running when the delivery failed.
    pub failed_in: Option<DeliveryState>,
    pub error: Option<String>,
    /// Retrying cannot help (the payload did not decode).
    pub fatal: bool,
    pub duration_ms: u64,
}

impl DeliveryReport {
    fn completed(state: DeliveryState, started: Instant) -> Result<Self, InvalidTransition> {
        Ok(Self {
            state: state.advance(DeliveryState::Completed)?,
            failed_in: None,
            error: None,
            fatal: false,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn failed(
        state: DeliveryState,
        started: Instant,
        error: String,
        fatal: bool,
    ) -> Result<Self, InvalidTransition> {
        Ok(Self {
            state: state.advance(DeliveryState::Failed)?,
            failed_in: Some(state),
            error: Some(error),
            fatal,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.state == DeliveryState::Completed
    }
}

/// Run one delivery through `received -> decoding -> executing`.
///
/// Decoding failures are fatal. Handler errors, panics and timeouts fail only
/// this delivery.
pub async fn run_delivery<H: JobHandler>(
    handler: &H,
    delivery: &Delivery,
    timeout: Option<Duration>,
) -> Result<DeliveryReport, InvalidTransition> {
    let started = Instant::now();
    let ctx = delivery.context();

    let state = DeliveryState::Received.advance(DeliveryState::Decoding)?;
    let payload = match delivery.message.decode::<H::Payload>() {
        Ok(payload) => payload,
        Err(e) => return DeliveryReport::failed(state, started, e.to_string(), true),
    };

    let state = state.advance(DeliveryState::Executing)?;
    let execution = AssertUnwindSafe(handler.execute(ctx, payload)).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, execution).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let error = format!("Job timed out after {}ms", limit.as_millis());
                return DeliveryReport::failed(state, started, error, false);
            }
        },
        None => execution.await,
    };

    match outcome {
        Ok(Ok(())) => DeliveryReport::completed(state, started),
        Ok(Err(error)) => DeliveryReport::failed(state, started, error.to_string(), false),
        Err(payload) => {
            let error = format!("Job panicked: {}", panic_message(payload.as_ref()));
            DeliveryReport::failed(state, started, error, false)
        }
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue_name: String,
    pub queue: ActorRef<QueueMessage>,
    pub events: broadcast::Sender<JobEvent>,
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
}

/// State for the worker actor.
pub struct WorkerState {
    worker_id: String,
    queue_name: String,
    queue: ActorRef<QueueMessage>,
    events: broadcast::Sender<JobEvent>,
    timeout: Option<Duration>,
    poll_interval: Duration,
    rpc_timeout: Duration,
}

/// Worker actor that pulls deliveries from one queue and runs `H`.
///
/// One worker runs one delivery at a time; a worker handle's concurrency is
/// the number of worker actors it starts.
pub struct WorkerActor<H> {
    handler: Arc<H>,
    _marker: PhantomData<fn() -> H>,
}

impl<H: JobHandler> WorkerActor<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }

    async fn process(&self, state: &WorkerState, delivery: Delivery) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            worker = %state.worker_id,
            job_id = %delivery.job_id,
            correlation_id = %delivery.message.correlation_id,
            attempt = delivery.attempt,
            "Processing job {}",
            delivery.name
        );
        tracing::debug!(job_id = %delivery.job_id, "Job:data: {}", delivery.message.data);

        let report = run_delivery(self.handler.as_ref(), &delivery, state.timeout).await?;

        let message = if report.is_completed() {
            tracing::info!(job_id = %delivery.job_id, duration_ms = report.duration_ms, "Job processed");
            QueueMessage::Ack {
                job_id: delivery.job_id,
                worker_id: state.worker_id.clone(),
                duration_ms: report.duration_ms,
            }
        } else {
            let error = report.error.unwrap_or_default();
            tracing::warn!(
                job_id = %delivery.job_id,
                stage = %report.failed_in.unwrap_or(DeliveryState::Executing),
                "Job failed: {}",
                error
            );
            QueueMessage::Nack {
                job_id: delivery.job_id,
                worker_id: state.worker_id.clone(),
                error,
                fatal: report.fatal,
            }
        };

        if state.queue.send_message(message).is_err() {
            tracing::warn!(
                job_id = %delivery.job_id,
                "Queue {} is gone, outcome not reported",
                state.queue_name
            );
        }
        Ok(())
    }
}

impl<H: JobHandler> Actor for WorkerActor<H> {
    type Msg = WorkerMessage;
    type State = WorkerState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker {} on {}", args.worker_id, args.queue_name);

        let _ = args.events.send(JobEvent::WorkerConnected {
            worker_id: args.worker_id.clone(),
            queue_name: args.queue_name.clone(),
            timestamp: Utc::now(),
        });

        myself.send_message(WorkerMessage::Poll)?;

        Ok(WorkerState {
            worker_id: args.worker_id,
            queue_name: args.queue_name,
            queue: args.queue,
            events: args.events,
            timeout: args.timeout,
            poll_interval: args.poll_interval,
            rpc_timeout: args.rpc_timeout,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                let worker_id = state.worker_id.clone();
                let result = ractor::rpc::call(
                    &state.queue,
                    |reply| QueueMessage::RequestDelivery { worker_id, reply },
                    Some(state.rpc_timeout),
                )
                .await;

                match result {
                    Ok(CallResult::Success(Some(delivery))) => {
                        self.process(state, delivery).await?;
                        // Look for more work right away.
                        myself.send_message(WorkerMessage::Poll)?;
                    }
                    Ok(CallResult::Success(None)) | Ok(CallResult::Timeout) => {
                        myself.send_after(state.poll_interval, || WorkerMessage::Poll);
                    }
                    Ok(CallResult::SenderError) | Err(_) => {
                        tracing::warn!(
                            "Worker {} lost its queue {}, stopping",
                            state.worker_id,
                            state.queue_name
                        );
                        myself.stop(Some("queue unavailable".to_string()));
                    }
                }
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let _ = state.events.send(JobEvent::WorkerDisconnected {
            worker_id: state.worker_id.clone(),
            queue_name: state.queue_name.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
