//! Job handler trait.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use dispatch_core::JobContext;
use serde::de::DeserializeOwned;

/// Error returned by a job handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for job handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Business operation run for every delivery of a queue.
///
/// The worker decodes the envelope's `data` into [`JobHandler::Payload`]
/// before calling `execute`; a payload that does not decode never reaches the
/// handler.
pub trait JobHandler: Send + Sync + 'static {
    /// The business request type carried by the envelope.
    type Payload: DeserializeOwned + Send + 'static;

    /// Process one delivery.
    fn execute(&self, ctx: JobContext, payload: Self::Payload) -> HandlerFuture;
}

/// A job handler built from an async closure.
pub struct FnHandler<P, F> {
    handler: F,
    _payload: PhantomData<fn() -> P>,
}

impl<P, F, Fut> FnHandler<P, F>
where
    F: Fn(JobContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _payload: PhantomData,
        }
    }
}

impl<P, F, Fut> JobHandler for FnHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(JobContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    type Payload = P;

    fn execute(&self, ctx: JobContext, payload: P) -> HandlerFuture {
        Box::pin((self.handler)(ctx, payload))
    }
}
