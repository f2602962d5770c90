#![allow(dead_code)]

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use broker::{Broker, BrokerConfig, QueueEvents};
use db::DbConfig;
use dispatch_core::JobEvent;
use tokio::runtime::Runtime;

/// One runtime for the whole test binary, so the in-memory database
/// connection outlives individual tests.
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

pub async fn start_broker() -> Broker {
    Broker::start(BrokerConfig::default())
        .await
        .expect("failed to start broker")
}

/// Queue name not used by any other test.
pub fn unique_queue(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Wait for the first event matching `predicate`.
pub async fn wait_for<P>(events: &mut QueueEvents, predicate: P) -> JobEvent
where
    P: Fn(&JobEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
