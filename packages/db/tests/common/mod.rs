use std::sync::LazyLock;

use db::{DbConfig, DbError, TABLES};
use tokio::sync::{Mutex, MutexGuard};

/// Tests share one in-memory store; this serializes them.
static STORE: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Lock the store and empty every job table.
pub async fn empty_store() -> Result<MutexGuard<'static, ()>, DbError> {
    let guard = STORE.lock().await;
    db::init(DbConfig::memory()).await?;

    let statements: String = TABLES.iter().map(|table| format!("DELETE {};", table)).collect();
    db::get_db()?.query(statements).await?.check()?;

    Ok(guard)
}
