//! Process-wide database connection, opened once and shared.

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use tokio::sync::OnceCell;

use crate::config::DbConfig;

pub type Database = Surreal<Any>;

static DB: OnceCell<Database> = OnceCell::const_new();

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database not initialized - call db::init first")]
    NotInitialized,
    #[error("Invalid database configuration: {0}")]
    Config(String),
    #[error("Database error: {0}")]
    Surreal(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

/// Open the shared connection.
///
/// Only the first successful call connects; later calls get the same
/// connection whatever their `config`.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    if config.endpoint.trim().is_empty() {
        return Err(DbError::Config("endpoint is empty".to_string()));
    }

    DB.get_or_try_init(|| open(config)).await
}

async fn open(config: DbConfig) -> Result<Database, DbError> {
    tracing::info!(endpoint = %config.endpoint, "Opening job store");

    let db = connect(config.endpoint.as_str()).await?;
    if let Some((username, password)) = &config.credentials {
        db.signin(Root { username, password }).await?;
    }
    db.use_ns(&config.namespace).use_db(&config.database).await?;

    if !config.is_durable() {
        tracing::warn!("Job store is in memory; queued jobs are lost on restart");
    }
    tracing::info!("Job store ready: {}/{}", config.namespace, config.database);

    Ok(db)
}

/// The shared connection, once [`init_db`] has succeeded.
pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}
