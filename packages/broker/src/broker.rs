//! Process-wide broker handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dispatch_core::{Job, JobEvent, JobId, JobMessage, JobOptions, QueueConfig, QueueStats};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef, Message, RpcReplyPort};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::client::{QueueClient, SubmitFuture};
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::handler::JobHandler;
use crate::messages::{QueueMessage, SupervisorMessage};
use crate::supervisor::{Supervisor, SupervisorArgs};
use crate::worker_actor::{WorkerActor, WorkerArgs};
use crate::worker_handle::{QueueEvents, WorkerHandle};

/// Request/reply exchange with an actor, bounded by `timeout`.
pub(crate) async fn call<M, T, F>(
    actor: &ActorRef<M>,
    build: F,
    timeout: Duration,
) -> Result<T, BrokerError>
where
    M: Message,
    T: Send + 'static,
    F: FnOnce(RpcReplyPort<T>) -> M,
{
    match ractor::rpc::call(actor, build, Some(timeout)).await {
        Ok(CallResult::Success(value)) => Ok(value),
        Ok(CallResult::Timeout) => Err(BrokerError::Timeout),
        Ok(CallResult::SenderError) => Err(BrokerError::Unavailable(
            "actor stopped before replying".to_string(),
        )),
        Err(_) => Err(BrokerError::Unavailable("actor is not running".to_string())),
    }
}

struct BrokerInner {
    instance_id: String,
    supervisor: ActorRef<SupervisorMessage>,
    supervisor_handle: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<JobEvent>,
    config: BrokerConfig,
    worker_counter: AtomicU64,
}

/// Handle to a running broker. Cheap to clone; all clones share one actor
/// system.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    /// Start the supervisor. The database must already be initialized.
    pub async fn start(config: BrokerConfig) -> Result<Self, BrokerError> {
        let instance_id = format!("broker-{}", Uuid::new_v4().simple());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let args = SupervisorArgs {
            instance_id: instance_id.clone(),
            events: events.clone(),
            default_queue: config.default_queue.clone(),
        };
        let (supervisor, handle) =
            Actor::spawn(Some(format!("{}/supervisor", instance_id)), Supervisor, args)
                .await
                .map_err(|e| BrokerError::Actor(format!("Failed to start supervisor: {}", e)))?;

        tracing::info!("Job broker {} started", instance_id);

        Ok(Self {
            inner: Arc::new(BrokerInner {
                instance_id,
                supervisor,
                supervisor_handle: Mutex::new(Some(handle)),
                events,
                config,
                worker_counter: AtomicU64::new(0),
            }),
        })
    }

    fn rpc_timeout(&self) -> Duration {
        self.inner.config.rpc_timeout()
    }

    async fn queue(
        &self,
        name: &str,
        config: Option<QueueConfig>,
    ) -> Result<ActorRef<QueueMessage>, BrokerError> {
        let name = name.to_string();
        call(
            &self.inner.supervisor,
            |reply| SupervisorMessage::DeclareQueue {
                name,
                config,
                reply,
            },
            self.rpc_timeout(),
        )
        .await?
    }

    /// Start `name` with `config`, or reconfigure it if it is running.
    pub async fn declare_queue(&self, name: &str, config: QueueConfig) -> Result<(), BrokerError> {
        self.queue(name, Some(config)).await.map(|_| ())
    }

    /// Names of the running queues.
    pub async fn queues(&self) -> Result<Vec<String>, BrokerError> {
        call(
            &self.inner.supervisor,
            |reply| SupervisorMessage::ListQueues { reply },
            self.rpc_timeout(),
        )
        .await
    }

    /// Attach `handler` to `queue_name` with `config.concurrency` workers.
    pub async fn process<H: JobHandler>(
        &self,
        queue_name: &str,
        handler: H,
        config: QueueConfig,
    ) -> Result<WorkerHandle, BrokerError> {
        let queue = self.queue(queue_name, Some(config.clone())).await?;
        let handler = Arc::new(handler);

        let mut workers = Vec::with_capacity(config.concurrency as usize);
        for _ in 0..config.concurrency.max(1) {
            let n = self.inner.worker_counter.fetch_add(1, Ordering::Relaxed) + 1;
            let worker_id = format!("{}-worker-{}", queue_name, n);
            let args = WorkerArgs {
                worker_id: worker_id.clone(),
                queue_name: queue_name.to_string(),
                queue: queue.clone(),
                events: self.inner.events.clone(),
                timeout: config.timeout(),
                poll_interval: config.poll_interval(),
                rpc_timeout: self.rpc_timeout(),
            };

            let spawned = Actor::spawn_linked(
                Some(format!("{}/{}", self.inner.instance_id, worker_id)),
                WorkerActor::new(handler.clone()),
                args,
                self.inner.supervisor.get_cell(),
            )
            .await;
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // Don't leave half a worker pool running.
                    for (worker, _) in &workers {
                        worker.stop(None);
                    }
                    return Err(BrokerError::Actor(format!(
                        "Failed to spawn worker {}: {}",
                        worker_id, e
                    )));
                }
            }
        }

        self.inner
            .supervisor
            .send_message(SupervisorMessage::WorkersStarted {
                queue_name: queue_name.to_string(),
                workers: workers.iter().map(|(worker, _)| worker.clone()).collect(),
            })
            .map_err(|_| BrokerError::Unavailable("supervisor is not running".to_string()))?;

        tracing::info!("registered job: {}", queue_name);

        Ok(WorkerHandle::new(queue_name, workers, self.inner.events.clone()))
    }

    /// Counts of the queue's jobs by state.
    pub async fn stats(&self, queue_name: &str) -> Result<QueueStats, BrokerError> {
        let queue = self.queue(queue_name, None).await?;
        call(
            &queue,
            |reply| QueueMessage::GetStats { reply },
            self.rpc_timeout(),
        )
        .await
    }

    /// A job of `queue_name` that has not reached a terminal state.
    pub async fn job(&self, queue_name: &str, job_id: JobId) -> Result<Option<Job>, BrokerError> {
        let queue = self.queue(queue_name, None).await?;
        call(
            &queue,
            |reply| QueueMessage::GetJob { job_id, reply },
            self.rpc_timeout(),
        )
        .await
    }

    /// Lifecycle events of every queue.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Lifecycle events of one queue.
    pub fn subscribe_queue(&self, queue_name: &str) -> QueueEvents {
        QueueEvents::new(queue_name, self.inner.events.subscribe())
    }

    /// Stop all workers and queues and wait for the supervisor to exit.
    ///
    /// Deliveries cut short here stay active in the store and are delivered
    /// again when their queue next starts.
    pub async fn shutdown(&self) {
        let _ = self
            .inner
            .supervisor
            .send_message(SupervisorMessage::Shutdown);

        if let Some(handle) = self.inner.supervisor_handle.lock().await.take() {
            let _ = handle.await;
        }
        tracing::info!("Job broker {} stopped", self.inner.instance_id);
    }
}

impl QueueClient for Broker {
    fn submit<'a>(
        &'a self,
        queue_name: &'a str,
        options: JobOptions,
        message: JobMessage,
    ) -> SubmitFuture<'a> {
        Box::pin(async move {
            let queue = self.queue(queue_name, None).await?;
            call(
                &queue,
                |reply| QueueMessage::Submit {
                    options,
                    message,
                    reply,
                },
                self.rpc_timeout(),
            )
            .await?
        })
    }
}
