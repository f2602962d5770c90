//! The background job demo.
//!
//! `POST /api/v1/demo` runs [`TriggerDemoJobHandler`], which places the
//! request on [`DEMO_JOB_QUEUE`]. [`DemoJobProcessor`] consumes that queue and
//! runs a long task for every delivery.
//!
//! Only the request and response contracts are built without the `server`
//! feature, so clients can share them.

mod contracts;

#[cfg(feature = "server")]
mod handler;

#[cfg(feature = "server")]
mod processor;

pub use contracts::{DemoJobRequest, TriggerDemoJobResponse};

#[cfg(feature = "server")]
pub use handler::{TriggerDemoJobCommand, TriggerDemoJobHandler};

#[cfg(feature = "server")]
pub use processor::{DemoJobProcessor, register_demo_worker};

/// Queue the demo jobs are placed on.
pub const DEMO_JOB_QUEUE: &str = "demo-job-queue";

/// Display name given to every demo job.
pub fn demo_job_name() -> String {
    format!("JOB:{}", DEMO_JOB_QUEUE)
}
