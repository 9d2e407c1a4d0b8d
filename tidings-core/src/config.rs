//! Environment-driven logging configuration
//!
//! | Variable                 | Meaning                                 | Default        |
//! |--------------------------|-----------------------------------------|----------------|
//! | `TIDINGS_REMOTE_LOGGING` | ship records to the remote sink         | disabled       |
//! | `TIDINGS_UID`            | installation id in the default topic    | `unknown`      |
//! | `TIDINGS_REMOTE_TOPIC`   | explicit topic                          | template       |
//! | `TIDINGS_REMOTE_QUEUE`   | remote sink queue capacity              | 1024           |
//! | `TIDINGS_LOG_LEVEL`      | root threshold (name or rank)           | `INFO`         |
//! | `TIDINGS_TRACING_FILTER` | `tracing` env-filter directive          | `info`         |
//! | `TIDINGS_JSON_LOGS`      | JSON output for the tracing subscriber  | disabled       |
//!
//! Boolean flags only accept the tokens in [`TRUTHY_TOKENS`]; any other value
//! leaves the feature off.

use serde::{Deserialize, Serialize};

use crate::errors::LoggingError;
use crate::levels::Level;
use crate::sink::remote::{RemoteSinkConfig, DEFAULT_QUEUE_CAPACITY};

pub const ENV_REMOTE_LOGGING: &str = "TIDINGS_REMOTE_LOGGING";
pub const ENV_UID: &str = "TIDINGS_UID";
pub const ENV_REMOTE_TOPIC: &str = "TIDINGS_REMOTE_TOPIC";
pub const ENV_REMOTE_QUEUE: &str = "TIDINGS_REMOTE_QUEUE";
pub const ENV_LOG_LEVEL: &str = "TIDINGS_LOG_LEVEL";
pub const ENV_TRACING_FILTER: &str = "TIDINGS_TRACING_FILTER";
pub const ENV_JSON_LOGS: &str = "TIDINGS_JSON_LOGS";

/// The only values that switch a flag on
pub const TRUTHY_TOKENS: &[&str] = &["1", "True", "true", "Yes", "Nai", "Si", "Da", "sudo"];

/// Exact, case-sensitive match against [`TRUTHY_TOKENS`]
pub fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| TRUTHY_TOKENS.contains(&v))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub sink: RemoteSinkConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Threshold for loggers without their own or an ancestor's level
    pub root_level: String,
    pub remote: RemoteConfig,
    pub tracing: TracingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            root_level: "INFO".to_string(),
            remote: RemoteConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Read the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests use a map)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let queue_capacity = non_empty(ENV_REMOTE_QUEUE)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        Self {
            root_level: non_empty(ENV_LOG_LEVEL).unwrap_or(defaults.root_level),
            remote: RemoteConfig {
                enabled: is_truthy(lookup(ENV_REMOTE_LOGGING).as_deref()),
                sink: RemoteSinkConfig {
                    topic: non_empty(ENV_REMOTE_TOPIC),
                    uid: non_empty(ENV_UID),
                    queue_capacity,
                },
            },
            tracing: TracingConfig {
                filter: non_empty(ENV_TRACING_FILTER).unwrap_or(defaults.tracing.filter),
                json: is_truthy(lookup(ENV_JSON_LOGS).as_deref()),
            },
        }
    }

    /// Parsed root threshold
    pub fn root_level(&self) -> Result<Level, LoggingError> {
        self.root_level
            .parse::<Level>()
            .map_err(LoggingError::from)
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        self.root_level()?;

        if self.remote.sink.queue_capacity == 0 {
            return Err(LoggingError::InvalidConfig(
                "remote queue capacity must be positive".to_string(),
            ));
        }

        if self.tracing.filter.trim().is_empty() {
            return Err(LoggingError::InvalidConfig(
                "tracing filter must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> LoggingConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LoggingConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_truthy_allow_list() {
        for token in TRUTHY_TOKENS {
            assert!(is_truthy(Some(*token)), "{token} should enable");
        }
        for token in ["0", "false", "TRUE", "yes", "on", "enabled", " 1", ""] {
            assert!(!is_truthy(Some(token)), "{token:?} should not enable");
        }
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = config_from(&[]);
        assert_eq!(config, LoggingConfig::default());
        assert!(!config.remote.enabled);
        assert_eq!(config.root_level().unwrap(), Level::INFO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_flag_with_default_topic() {
        let config = config_from(&[(ENV_REMOTE_LOGGING, "Da"), (ENV_UID, "bot-7")]);
        assert!(config.remote.enabled);
        assert_eq!(config.remote.sink.resolved_topic(), "tidings/bot-7/log");
    }

    #[test]
    fn test_unrecognized_flag_fails_closed() {
        let config = config_from(&[(ENV_REMOTE_LOGGING, "enabled"), (ENV_UID, "bot-7")]);
        assert!(!config.remote.enabled);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_REMOTE_TOPIC, "ops/logs"),
            (ENV_REMOTE_QUEUE, "16"),
            (ENV_LOG_LEVEL, "network"),
            (ENV_TRACING_FILTER, "tidings_core=debug"),
            (ENV_JSON_LOGS, "1"),
        ]);
        assert_eq!(config.remote.sink.resolved_topic(), "ops/logs");
        assert_eq!(config.remote.sink.queue_capacity, 16);
        assert_eq!(config.root_level().unwrap(), Level::NETWORK);
        assert_eq!(config.tracing.filter, "tidings_core=debug");
        assert!(config.tracing.json);
    }

    #[test]
    fn test_unparsable_queue_falls_back() {
        let config = config_from(&[(ENV_REMOTE_QUEUE, "lots")]);
        assert_eq!(config.remote.sink.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_validation() {
        let mut config = LoggingConfig::default();
        config.root_level = "LOUD".to_string();
        assert!(config.validate().is_err());

        let mut config = LoggingConfig::default();
        config.remote.sink.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = LoggingConfig::default();
        config.tracing.filter = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip_shape() {
        let config = config_from(&[(ENV_REMOTE_LOGGING, "1"), (ENV_UID, "u1")]);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["remote"]["enabled"], true);
        assert_eq!(value["remote"]["uid"], "u1");
        assert_eq!(value["root_level"], "INFO");
    }
}
