//! Background job demo server function.

use demo::{DemoJobRequest, TriggerDemoJobResponse};
use dioxus::prelude::*;
use dispatch_core::DataResponse;

/// Place `request` on the demo queue.
///
/// Failures come back as an unsuccessful [`DataResponse`] carrying the status
/// code; `Err` is reserved for transport problems.
#[post("/api/v1/demo")]
pub async fn trigger_demo_job(
    request: DemoJobRequest,
) -> Result<DataResponse<TriggerDemoJobResponse>, ServerFnError> {
    #[cfg(feature = "server")]
    {
        use demo::TriggerDemoJobCommand;
        use dispatch_core::{GENERIC_ERROR_MESSAGE, StatusCode};

        let state = match crate::ensure_initialized().await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("{}", e);
                return Ok(DataResponse::error(
                    StatusCode::ServiceUnavailable,
                    GENERIC_ERROR_MESSAGE,
                ));
            }
        };

        Ok(state
            .demo
            .handle(Some(TriggerDemoJobCommand::new(request)))
            .await)
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = request;
        Err(ServerFnError::new("Server-only function"))
    }
}
