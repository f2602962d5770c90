//! Consumer of the demo queue.

use std::time::Duration;

use broker::{Broker, BrokerError, HandlerError, HandlerFuture, JobHandler, WorkerHandle};
use dispatch_core::{JobContext, QueueConfig};

use crate::DEMO_JOB_QUEUE;
use crate::contracts::DemoJobRequest;

/// Long running demo task: logs the delivery, then works for a while.
#[derive(Debug, Clone, Copy)]
pub struct DemoJobProcessor {
    work: Duration,
}

impl DemoJobProcessor {
    pub fn new(work: Duration) -> Self {
        Self { work }
    }
}

impl Default for DemoJobProcessor {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl JobHandler for DemoJobProcessor {
    type Payload = DemoJobRequest;

    fn execute(&self, ctx: JobContext, request: DemoJobRequest) -> HandlerFuture {
        let work = self.work;
        Box::pin(async move {
            tracing::info!("Job:id: {}", ctx.job_id);
            tracing::info!("Job:name: {}", ctx.name);
            tracing::info!("Job:correlationId: {}", ctx.correlation_id);
            let body = serde_json::to_string(&request)?;
            tracing::info!("request: {}", body);

            tokio::time::sleep(work).await;

            tracing::info!("Job:processed: {}", ctx.job_id);
            Ok::<(), HandlerError>(())
        })
    }
}

/// Start the demo workers and log their outcomes.
pub async fn register_demo_worker(
    broker: &Broker,
    processor: DemoJobProcessor,
    config: QueueConfig,
) -> Result<WorkerHandle, BrokerError> {
    let mut worker = broker.process(DEMO_JOB_QUEUE, processor, config).await?;

    worker
        .on_completed(|job_id| tracing::info!("Job completed: {}", job_id))
        .on_failed(|job_id, error| tracing::error!("Job failed: {}, Error: {}", job_id, error));

    Ok(worker)
}
