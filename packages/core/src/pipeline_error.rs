//! Failure record produced by the pipeline step executor.

use serde::{Deserialize, Serialize};

use crate::{ResultError, StatusCode};

/// Which named step failed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineError {
    pub status_code: StatusCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
}

impl PipelineError {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            step_name: None,
        }
    }

    /// Tag the error with the step it escaped from.
    pub fn in_step(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }
}

impl From<ResultError> for PipelineError {
    fn from(value: ResultError) -> Self {
        Self::new(value.status_code, value.message)
    }
}

impl From<std::convert::Infallible> for PipelineError {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.step_name {
            Some(step) => write!(f, "step '{}' failed ({}): {}", step, self.status_code, self.message),
            None => write!(f, "{}: {}", self.status_code, self.message),
        }
    }
}
