//! Supervisor actor that owns the queue actors and tracks workers.

use std::collections::HashMap;

use dispatch_core::{JobEvent, QueueConfig};
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::broadcast;

use crate::error::BrokerError;
use crate::messages::{QueueMessage, SupervisorMessage, WorkerMessage};
use crate::queue_actor::{QueueActor, QueueArgs};

/// Startup arguments for the supervisor.
pub struct SupervisorArgs {
    /// Prefix for actor names, unique per broker.
    pub instance_id: String,
    pub events: broadcast::Sender<JobEvent>,
    pub default_queue: QueueConfig,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    instance_id: String,
    /// Queue actors by queue name.
    queues: HashMap<String, ActorRef<QueueMessage>>,
    /// Worker actors by queue name.
    workers: HashMap<String, Vec<ActorRef<WorkerMessage>>>,
    events: broadcast::Sender<JobEvent>,
    default_queue: QueueConfig,
}

impl SupervisorState {
    /// Drop a child that stopped. A queue is respawned, and recovers its
    /// persisted jobs, on the next declaration.
    fn forget(&mut self, id: ActorId) {
        self.queues.retain(|_, queue| queue.get_id() != id);
        for workers in self.workers.values_mut() {
            workers.retain(|worker| worker.get_id() != id);
        }
    }

    async fn declare_queue(
        &mut self,
        myself: &ActorRef<SupervisorMessage>,
        name: String,
        config: Option<QueueConfig>,
    ) -> Result<ActorRef<QueueMessage>, BrokerError> {
        if name.trim().is_empty() {
            return Err(BrokerError::QueueNotFound("queue name is empty".to_string()));
        }

        if let Some(queue) = self.queues.get(&name) {
            if let Some(config) = config {
                queue
                    .send_message(QueueMessage::Configure { config })
                    .map_err(|_| BrokerError::Unavailable(format!("queue {} is not running", name)))?;
            }
            return Ok(queue.clone());
        }

        let args = QueueArgs {
            name: name.clone(),
            config: config.unwrap_or_else(|| self.default_queue.clone()),
            events: self.events.clone(),
        };

        let (queue, _handle) = Actor::spawn_linked(
            Some(format!("{}/queue/{}", self.instance_id, name)),
            QueueActor,
            args,
            myself.get_cell(),
        )
        .await
        .map_err(|e| BrokerError::Actor(format!("Failed to spawn queue {}: {}", name, e)))?;

        self.queues.insert(name, queue.clone());
        Ok(queue)
    }
}

/// Supervisor actor that manages all queues.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting job broker supervisor {}", args.instance_id);

        Ok(SupervisorState {
            instance_id: args.instance_id,
            queues: HashMap::new(),
            workers: HashMap::new(),
            events: args.events,
            default_queue: args.default_queue,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::DeclareQueue {
                name,
                config,
                reply,
            } => {
                let _ = reply.send(state.declare_queue(&myself, name, config).await);
            }

            SupervisorMessage::WorkersStarted {
                queue_name,
                workers,
            } => {
                state.workers.entry(queue_name).or_default().extend(workers);
            }

            SupervisorMessage::ListQueues { reply } => {
                let mut names: Vec<String> = state.queues.keys().cloned().collect();
                names.sort();
                let _ = reply.send(names);
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor {}", state.instance_id);
                for worker in state.workers.values().flatten() {
                    let _ = worker.send_message(WorkerMessage::Shutdown);
                }
                for queue in state.queues.values() {
                    let _ = queue.send_message(QueueMessage::Shutdown);
                }
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                let id = cell.get_id();
                state.forget(id);
                tracing::debug!(
                    "Child actor {} terminated: {:?}",
                    cell.get_name().unwrap_or_else(|| id.to_string()),
                    reason
                );
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                let id = cell.get_id();
                state.forget(id);
                tracing::warn!(
                    "Child actor {} failed: {}",
                    cell.get_name().unwrap_or_else(|| id.to_string()),
                    error
                );
            }
            _ => {}
        }
        Ok(())
    }
}
