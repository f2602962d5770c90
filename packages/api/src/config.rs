//! Process configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use db::DbConfig;
use dispatch_core::QueueConfig;

/// Runtime settings of the server process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    /// Deliveries of the demo queue processed at once.
    pub worker_concurrency: u32,
    pub max_attempts: u32,
    /// How long one demo job works for.
    pub demo_work_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let queue = QueueConfig::default();
        Self {
            db: DbConfig::memory(),
            worker_concurrency: queue.concurrency,
            max_attempts: queue.max_attempts,
            demo_work_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Read `DISPATCH_*` variables, keeping the default for anything unset or
    /// invalid.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let db = match lookup("DISPATCH_DB_ENDPOINT") {
            Some(endpoint) if !endpoint.trim().is_empty() => DbConfig::endpoint(endpoint.trim()),
            _ => defaults.db,
        };

        Self {
            db,
            worker_concurrency: parse_or(
                &lookup,
                "DISPATCH_WORKER_CONCURRENCY",
                defaults.worker_concurrency,
            )
            .max(1),
            max_attempts: parse_or(&lookup, "DISPATCH_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            demo_work_ms: parse_or(&lookup, "DISPATCH_DEMO_WORK_MS", defaults.demo_work_ms),
        }
    }

    /// Settings of the demo queue.
    pub fn demo_queue(&self) -> QueueConfig {
        QueueConfig::default()
            .with_concurrency(self.worker_concurrency)
            .with_max_attempts(self.max_attempts)
    }

    pub fn demo_work(&self) -> Duration {
        Duration::from_millis(self.demo_work_ms)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {:?} for {}, using {}", raw, key, default);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.db.endpoint, "mem://");
        assert_eq!(config.demo_work(), Duration::from_secs(10));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn reads_dispatch_variables() {
        let config = config(&[
            ("DISPATCH_DB_ENDPOINT", "rocksdb://data/jobs"),
            ("DISPATCH_WORKER_CONCURRENCY", "8"),
            ("DISPATCH_MAX_ATTEMPTS", "5"),
            ("DISPATCH_DEMO_WORK_MS", " 250 "),
        ]);

        assert_eq!(config.db.endpoint, "rocksdb://data/jobs");
        assert_eq!(config.demo_work_ms, 250);

        let queue = config.demo_queue();
        assert_eq!(queue.concurrency, 8);
        assert_eq!(queue.max_attempts, 5);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = config(&[
            ("DISPATCH_WORKER_CONCURRENCY", "lots"),
            ("DISPATCH_MAX_ATTEMPTS", "0"),
            ("DISPATCH_DEMO_WORK_MS", "-1"),
        ]);
        let defaults = AppConfig::default();

        assert_eq!(config.worker_concurrency, defaults.worker_concurrency);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.demo_work_ms, 10_000);
    }
}
