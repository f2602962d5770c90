//! Request and response bodies of the demo endpoint.

use dispatch_core::JobId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /api/v1/demo`, carried to the worker as the job payload.
///
/// Any JSON object is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemoJobRequest(pub Map<String, Value>);

impl DemoJobRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Returned once the job is on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDemoJobResponse {
    pub message: String,
    pub job_id: JobId,
}

impl TriggerDemoJobResponse {
    pub const MESSAGE: &'static str = "Trigger Job Successfully";

    pub fn new(job_id: JobId) -> Self {
        Self {
            message: Self::MESSAGE.to_string(),
            job_id,
        }
    }
}
