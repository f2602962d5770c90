//! Response envelope handed to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PipelineError, ResultError, StatusCode};

/// Message substituted for server-side failures so internals never leak.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred while processing the request";

/// Structured body returned to callers on success and on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct DataResponse<T> {
    pub success: bool,
    pub status_code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> DataResponse<T> {
    pub fn success(status_code: StatusCode, data: T) -> Self {
        Self {
            success: true,
            status_code,
            data: Some(data),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            data: None,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Map a pipeline failure to a response.
    ///
    /// Client errors keep their message; server errors are logged and
    /// replaced with [`GENERIC_ERROR_MESSAGE`].
    pub fn pipeline_error(error: PipelineError) -> Self {
        if error.status_code.is_server_error() {
            tracing::error!(
                step = error.step_name.as_deref().unwrap_or("-"),
                "Pipeline failed: {}",
                error.message
            );
            Self::error(error.status_code, GENERIC_ERROR_MESSAGE)
        } else {
            Self::error(error.status_code, error.message)
        }
    }

    pub fn http_status(&self) -> u16 {
        self.status_code.as_u16()
    }
}

impl<T> From<ResultError> for DataResponse<T> {
    fn from(value: ResultError) -> Self {
        Self::pipeline_error(value.into())
    }
}
