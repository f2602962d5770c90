//! SurrealDB persistence for the job broker.
//!
//! Accepted jobs are stored before a submission is acknowledged, so they
//! survive a restart of the process that holds the queues. Terminal jobs move
//! to `job_history`; jobs that will not be retried also get a `dead_letter`
//! record.
//!
//! Engines: `mem://` is always available, `rocksdb://` needs the `rocksdb`
//! feature.

mod config;
mod connection;
mod schema;
pub mod repositories;

pub use config::DbConfig;
pub use connection::{Database, DbError, get_db, init_db};
pub use schema::{TABLES, init_schema};

/// Connect and make sure the job tables exist. Safe to call repeatedly.
pub async fn init(config: DbConfig) -> Result<(), DbError> {
    init_db(config).await?;
    init_schema().await
}
