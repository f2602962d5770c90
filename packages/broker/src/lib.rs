//! In-process job broker built on Ractor actors.
//!
//! Stands in for an at-least-once durable queue: every accepted job is
//! persisted through the `db` crate before the submission is acknowledged,
//! and unfinished jobs are recovered when their queue starts.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor that owns the queue actors
//! - `QueueActor` - Holds one queue's jobs, hands out deliveries, applies retries
//! - `WorkerActor` - Pulls deliveries from a queue and runs a [`JobHandler`]
//!
//! # Usage
//!
//! ```ignore
//! use broker::{Broker, BrokerConfig, FnHandler, JobTrigger};
//!
//! let broker = Broker::start(BrokerConfig::default()).await?;
//! let worker = broker
//!     .process("emails", FnHandler::new(|ctx, payload: Email| async move { send(payload).await }), Default::default())
//!     .await?;
//!
//! let trigger = JobTrigger::new(Arc::new(broker.clone()), "emails");
//! trigger.trigger("JOB:emails", options, message).await?;
//! ```

mod broker;
mod client;
mod config;
mod error;
mod handler;
mod messages;
mod queue_actor;
mod service;
mod supervisor;
mod trigger;
mod worker_actor;
mod worker_handle;

pub use broker::Broker;
pub use client::{QueueClient, SubmitFuture, SubmitReceipt};
pub use config::BrokerConfig;
pub use error::BrokerError;
pub use handler::{FnHandler, HandlerError, HandlerFuture, HandlerResult, JobHandler};
pub use messages::{QueueMessage, SupervisorMessage, WorkerMessage};
pub use service::{JobSpec, TriggerJobParameters, TriggerJobService};
pub use trigger::JobTrigger;
pub use worker_actor::{DeliveryReport, run_delivery};
pub use worker_handle::{QueueEvents, WorkerHandle};
