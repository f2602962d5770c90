//! Core domain types for the job dispatch pipeline.
//!
//! This crate contains shared types used across all packages:
//! - Correlation and job identifiers
//! - The job message envelope, descriptor and options
//! - The status-coded Result channel and response envelope
//! - Queued job records, deliveries and lifecycle events

mod delivery;
mod envelope;
mod events;
mod ids;
mod job;
mod pipeline_error;
mod queue;
mod response;
mod result;
mod status;

pub use delivery::{Delivery, DeliveryState, InvalidTransition, JobContext};
pub use envelope::{EnvelopeError, JobDescriptor, JobMessage, JobOptions};
pub use events::JobEvent;
pub use ids::{CorrelationId, JobId};
pub use job::{Job, JobStatus};
pub use pipeline_error::PipelineError;
pub use queue::{BackoffPolicy, QueueConfig, QueueStats};
pub use response::{DataResponse, GENERIC_ERROR_MESSAGE};
pub use result::{ResultError, ServiceResult, panic_message, try_catch_result};
pub use status::StatusCode;
