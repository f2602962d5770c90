//! Where the job store lives.

use serde::Deserialize;

/// Connection settings for the job store.
///
/// `endpoint` takes any SurrealDB engine address: `mem://`, `rocksdb://path`,
/// `ws://host:port`. Only the engines enabled as crate features can connect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Root user and password, for servers that require sign-in.
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "dispatch".to_string(),
            database: "jobs".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Jobs kept in process memory only.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Jobs kept in a local file store.
    pub fn file(path: impl AsRef<str>) -> Self {
        Self::endpoint(format!("file://{}", path.as_ref()))
    }

    /// Jobs kept on disk (requires the `rocksdb` feature).
    pub fn rocksdb(path: impl AsRef<str>) -> Self {
        Self::endpoint(format!("rocksdb://{}", path.as_ref()))
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Whether jobs survive a restart of the process.
    pub fn is_durable(&self) -> bool {
        !self.endpoint.starts_with("mem://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_is_not_durable() {
        assert!(!DbConfig::memory().is_durable());
        assert!(DbConfig::rocksdb("data/jobs").is_durable());
        assert_eq!(DbConfig::rocksdb("data/jobs").endpoint, "rocksdb://data/jobs");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: DbConfig = serde_json::from_str(r#"{"endpoint":"ws://db:8000"}"#).unwrap();

        assert_eq!(config.endpoint, "ws://db:8000");
        assert_eq!(config.namespace, "dispatch");
        assert_eq!(config.credentials, None);
    }
}
