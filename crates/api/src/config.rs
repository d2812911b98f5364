//! Startup configuration read from the environment.
//!
//! | variable                  | default        |
//! |---------------------------|----------------|
//! | `TALLY_BIND_ADDR`         | `0.0.0.0:8080` |
//! | `TALLY_EXECUTION`         | `queued`       |
//! | `TALLY_QUEUE_CAPACITY`    | `1024`         |
//! | `TALLY_REPLY_TIMEOUT_MS`  | `5000`         |
//! | `TALLY_LOG_FORMAT`        | `json`         |

use std::net::SocketAddr;
use std::time::Duration;

use tally_infra::WorkerConfig;
use tally_observability::LogFormat;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// How postings reach the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Handlers call the ledger directly; ordering is lock-acquisition order.
    Direct,
    /// Handlers submit to the single ledger worker; FIFO ordering.
    #[default]
    Queued,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: &'static str) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub execution: ExecutionMode,
    pub worker: WorkerConfig,
    /// Upper bound on how long a queued request waits for the worker's reply.
    pub reply_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            execution: ExecutionMode::default(),
            worker: WorkerConfig::default(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            log_format: LogFormat::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults;
    /// set-but-unparseable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let bind = lookup("TALLY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        config.bind_addr = bind
            .parse()
            .map_err(|_| ConfigError::invalid("TALLY_BIND_ADDR", &bind, "expected host:port"))?;

        if let Some(raw) = lookup("TALLY_EXECUTION") {
            config.execution = match raw.trim().to_ascii_lowercase().as_str() {
                "direct" => ExecutionMode::Direct,
                "queued" => ExecutionMode::Queued,
                _ => {
                    return Err(ConfigError::invalid(
                        "TALLY_EXECUTION",
                        &raw,
                        "expected direct or queued",
                    ));
                }
            };
        }

        if let Some(raw) = lookup("TALLY_QUEUE_CAPACITY") {
            let capacity: usize = raw
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::invalid("TALLY_QUEUE_CAPACITY", &raw, "expected a positive integer")
                })?;
            config.worker = config.worker.with_queue_capacity(capacity);
        }

        if let Some(raw) = lookup("TALLY_REPLY_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::invalid("TALLY_REPLY_TIMEOUT_MS", &raw, "expected a positive integer")
            })?;
            config.reply_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup("TALLY_LOG_FORMAT") {
            config.log_format = LogFormat::parse(&raw).ok_or_else(|| {
                ConfigError::invalid("TALLY_LOG_FORMAT", &raw, "expected json or pretty")
            })?;
        }

        Ok(config)
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.execution, ExecutionMode::Queued);
        assert_eq!(config.worker.queue_capacity, 1024);
        assert_eq!(config.reply_timeout, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn reads_every_variable() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("TALLY_BIND_ADDR", "127.0.0.1:9000"),
            ("TALLY_EXECUTION", "Direct"),
            ("TALLY_QUEUE_CAPACITY", "16"),
            ("TALLY_REPLY_TIMEOUT_MS", "250"),
            ("TALLY_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.execution, ExecutionMode::Direct);
        assert_eq!(config.worker.queue_capacity, 16);
        assert_eq!(config.reply_timeout, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_bad_values() {
        let err = ApiConfig::from_lookup(lookup(&[("TALLY_EXECUTION", "sharded")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "TALLY_EXECUTION", .. }));

        let err = ApiConfig::from_lookup(lookup(&[("TALLY_QUEUE_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "TALLY_QUEUE_CAPACITY", .. }));

        let err = ApiConfig::from_lookup(lookup(&[("TALLY_BIND_ADDR", "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "TALLY_BIND_ADDR", .. }));
    }
}
