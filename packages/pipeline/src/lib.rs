//! Pipeline step executor.
//!
//! A [`PipelineWorkflow`] runs the named steps of one request, sequentially
//! or as a concurrent group, and turns every failure into a single
//! [`PipelineWorkflowException`] tagged with the failing step's name.

mod workflow;

pub use workflow::{ParallelStep, PipelineWorkflow, PipelineWorkflowException, define_parallel_step};

pub use dispatch_core::PipelineError;
