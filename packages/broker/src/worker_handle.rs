//! Handle to the workers attached to one queue.

use dispatch_core::{JobEvent, JobId};
use ractor::ActorRef;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::messages::WorkerMessage;

/// Lifecycle events of a single queue.
pub struct QueueEvents {
    queue_name: String,
    receiver: broadcast::Receiver<JobEvent>,
}

impl QueueEvents {
    pub(crate) fn new(queue_name: impl Into<String>, receiver: broadcast::Receiver<JobEvent>) -> Self {
        Self {
            queue_name: queue_name.into(),
            receiver,
        }
    }

    /// Next event of this queue, or `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.queue_name() == self.queue_name => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} event(s) on {}", skipped, self.queue_name);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Returned by `Broker::process`.
///
/// Exposes `completed` and `failed` subscriptions for the queue. The events
/// are observability signals; retries are decided by the queue.
pub struct WorkerHandle {
    queue_name: String,
    workers: Vec<(ActorRef<WorkerMessage>, JoinHandle<()>)>,
    events: broadcast::Sender<JobEvent>,
    listeners: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        queue_name: &str,
        workers: Vec<(ActorRef<WorkerMessage>, JoinHandle<()>)>,
        events: broadcast::Sender<JobEvent>,
    ) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            workers,
            events,
            listeners: Vec::new(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Number of worker actors behind this handle.
    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Every lifecycle event of this queue from now on.
    pub fn subscribe(&self) -> QueueEvents {
        QueueEvents::new(self.queue_name.clone(), self.events.subscribe())
    }

    /// Call `f` with the job id of every completed delivery.
    pub fn on_completed<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(JobId) + Send + 'static,
    {
        self.listen(move |event| {
            if let JobEvent::JobCompleted { job_id, .. } = event {
                f(job_id);
            }
        })
    }

    /// Call `f` with the job id and error of every failed delivery.
    pub fn on_failed<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(JobId, &str) + Send + 'static,
    {
        self.listen(move |event| {
            if let JobEvent::JobFailed { job_id, error, .. } = event {
                f(job_id, &error);
            }
        })
    }

    fn listen<F>(&mut self, on_event: F) -> &mut Self
    where
        F: Fn(JobEvent) + Send + 'static,
    {
        let mut events = self.subscribe();
        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                on_event(event);
            }
        }));
        self
    }

    /// Let each worker finish its current delivery, then stop it.
    ///
    /// Listeners registered on this handle stop with it.
    pub async fn close(self) {
        for (worker, _) in &self.workers {
            let _ = worker.send_message(WorkerMessage::Shutdown);
        }
        for (_, handle) in self.workers {
            let _ = handle.await;
        }
        for listener in self.listeners {
            listener.abort();
        }
        tracing::info!("Closed workers of {}", self.queue_name);
    }
}
