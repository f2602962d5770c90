//! Server API functions for the job dispatch system.
//!
//! - `POST /api/v1/demo`: trigger the background job demo
//!
//! With the `server` feature the crate also owns process-wide
//! initialization: database, broker and the demo worker.

mod trigger;

#[cfg(feature = "server")]
mod config;

#[cfg(feature = "server")]
mod init;

pub use trigger::trigger_demo_job;

#[cfg(feature = "server")]
pub use config::AppConfig;

#[cfg(feature = "server")]
pub use init::*;

// Re-export the wire types for clients.
pub use demo::{DemoJobRequest, TriggerDemoJobResponse};
pub use dispatch_core::{DataResponse, JobId, StatusCode};
