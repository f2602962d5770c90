//! The Result channel used by every producer-path operation.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::{EnvelopeError, StatusCode};

/// Status-coded failure returned instead of raising across a service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{status_code}: {message}")]
pub struct ResultError {
    pub status_code: StatusCode,
    pub message: String,
}

impl ResultError {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Guard violation; the caller has to fix the request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BadRequest, message)
    }

    /// Unexpected failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalServerError, message)
    }
}

impl From<EnvelopeError> for ResultError {
    fn from(value: EnvelopeError) -> Self {
        ResultError::internal(value.to_string())
    }
}

/// Outcome of a service operation.
pub type ServiceResult<T> = Result<T, ResultError>;

/// Run `future` and fold every way it can go wrong into a [`ResultError`].
///
/// Returned errors are converted through `Into<ResultError>`; a panic inside
/// the future becomes an internal error carrying the panic message.
pub async fn try_catch_result<T, E, Fut>(future: Fut) -> ServiceResult<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<ResultError>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.into()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("Service operation panicked: {}", message);
            Err(ResultError::internal(message))
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_success_through() {
        let result = try_catch_result(async { Ok::<_, ResultError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn keeps_status_of_returned_error() {
        let result: ServiceResult<()> =
            try_catch_result(async { Err(ResultError::bad_request("params is null")) }).await;
        let error = result.unwrap_err();
        assert_eq!(error.status_code, StatusCode::BadRequest);
        assert_eq!(error.message, "params is null");
    }

    #[tokio::test]
    async fn converts_envelope_errors_to_internal() {
        let result: ServiceResult<u32> = try_catch_result(async {
            let value: u32 = crate::JobMessage::new(crate::CorrelationId::new(), "x").decode()?;
            Ok::<_, EnvelopeError>(value)
        })
        .await;
        assert_eq!(
            result.unwrap_err().status_code,
            StatusCode::InternalServerError
        );
    }

    #[tokio::test]
    async fn catches_panics() {
        let result: ServiceResult<()> = try_catch_result(async {
            if true {
                panic!("queue exploded");
            }
            Ok::<_, ResultError>(())
        })
        .await;
        let error = result.unwrap_err();
        assert_eq!(error.status_code, StatusCode::InternalServerError);
        assert_eq!(error.message, "queue exploded");
    }
}
