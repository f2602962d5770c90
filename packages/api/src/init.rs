//! Server initialization for the job dispatch system.

use std::sync::Arc;

use broker::{Broker, BrokerConfig, BrokerError, WorkerHandle};
use db::DbError;
use demo::{DemoJobProcessor, TriggerDemoJobHandler, register_demo_worker};
use tokio::sync::OnceCell;

use crate::config::AppConfig;

/// Initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Database initialization failed: {0}")]
    Database(#[from] DbError),

    #[error("Broker initialization failed: {0}")]
    Broker(#[from] BrokerError),
}

/// Long-lived services shared by every request.
pub struct AppState {
    pub broker: Broker,
    pub demo: TriggerDemoJobHandler,
    /// Keeps the demo workers attached for the life of the process.
    _demo_worker: WorkerHandle,
}

static STATE: OnceCell<AppState> = OnceCell::const_new();

/// Initialize the dispatch system from the environment on first use.
///
/// Concurrent callers wait for the same initialization; a failed attempt is
/// retried by the next caller.
pub async fn ensure_initialized() -> Result<&'static AppState, InitError> {
    STATE
        .get_or_try_init(|| init_dispatch(AppConfig::from_env()))
        .await
}

/// Open the database, start the broker and register the demo worker.
pub async fn init_dispatch(config: AppConfig) -> Result<AppState, InitError> {
    tracing::info!("Initializing job dispatch system...");

    db::init(config.db.clone()).await?;

    let broker = Broker::start(BrokerConfig::default()).await?;
    let worker = match register_demo_worker(
        &broker,
        DemoJobProcessor::new(config.demo_work()),
        config.demo_queue(),
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            broker.shutdown().await;
            return Err(e.into());
        }
    };

    let demo = TriggerDemoJobHandler::new(Arc::new(broker.clone()));

    tracing::info!("Job dispatch system initialized");
    Ok(AppState {
        broker,
        demo,
        _demo_worker: worker,
    })
}
