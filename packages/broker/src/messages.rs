//! Message types for actor communication.

use dispatch_core::{Delivery, Job, JobId, JobMessage, JobOptions, QueueConfig, QueueStats};
use ractor::{ActorRef, RpcReplyPort};

use crate::client::SubmitReceipt;
use crate::error::BrokerError;

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Accept a job onto the queue.
    Submit {
        options: JobOptions,
        message: JobMessage,
        reply: RpcReplyPort<Result<SubmitReceipt, BrokerError>>,
    },

    /// Request the next ready job for a worker.
    RequestDelivery {
        worker_id: String,
        reply: RpcReplyPort<Option<Delivery>>,
    },

    /// A delivery completed.
    Ack {
        job_id: JobId,
        worker_id: String,
        duration_ms: u64,
    },

    /// A delivery failed. `fatal` failures are never retried.
    Nack {
        job_id: JobId,
        worker_id: String,
        error: String,
        fatal: bool,
    },

    /// Replace the queue configuration.
    Configure { config: QueueConfig },

    /// Get a job that has not reached a terminal state.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },

    /// Shutdown the queue.
    Shutdown,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Ask the queue for work.
    Poll,

    /// Finish the current delivery, then stop.
    Shutdown,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Get a queue actor, starting the queue if needed.
    ///
    /// `Some(config)` also reconfigures a queue that is already running.
    DeclareQueue {
        name: String,
        config: Option<QueueConfig>,
        reply: RpcReplyPort<Result<ActorRef<QueueMessage>, BrokerError>>,
    },

    /// Track workers started for a queue.
    WorkersStarted {
        queue_name: String,
        workers: Vec<ActorRef<WorkerMessage>>,
    },

    /// List running queues.
    ListQueues { reply: RpcReplyPort<Vec<String>> },

    /// Stop all workers and queues.
    Shutdown,
}
