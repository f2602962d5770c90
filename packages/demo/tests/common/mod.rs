use std::future::Future;
use std::sync::LazyLock;

use db::DbConfig;
use tokio::runtime::Runtime;

/// Shared by every test so the in-memory database outlives each of them.
static RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build test runtime")
});

pub fn run<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(async {
        db::init(DbConfig::memory())
            .await
            .expect("failed to initialize database");
        future.await
    })
}
