//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use common::RetryPolicy;
use messaging::ConsumerConfig;
use thiserror::Error;

/// A variable was set to something that does not parse.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: Postgres connection string; unset means in-memory
///   stores and channel
/// - `DATABASE_MAX_CONNECTIONS` (default 5)
/// - `PROVIDER_TIMEOUT_MS` (default 10000)
/// - `CONSUMER_WORKERS`: workers per queue (default 2)
/// - `CONSUMER_POLL_INTERVAL_MS` (default 200)
/// - `MESSAGE_MAX_ATTEMPTS` (default 5)
/// - `MESSAGE_LEASE_SECS` (default 30)
/// - `PUBLISH_RETRY_ATTEMPTS` (default 5), `PUBLISH_RETRY_BASE_MS` (default 50)
/// - `TOKEN_RETENTION_HOURS`: how long decrement tokens are kept (default 168)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub provider_timeout: Duration,
    pub consumer_workers: usize,
    pub poll_interval: Duration,
    pub message_max_attempts: u32,
    pub lease_timeout: Duration,
    pub publish_retry_attempts: u32,
    pub publish_retry_base: Duration,
    pub token_retention: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let parse = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| ConfigError { key, value })
                })
                .transpose()
        };

        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError { key: "PORT", value })?,
            None => defaults.port,
        };
        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse().map_err(|()| ConfigError {
                key: "LOG_FORMAT",
                value,
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse("DATABASE_MAX_CONNECTIONS")?
                .map_or(defaults.database_max_connections, |n| n as u32),
            provider_timeout: parse("PROVIDER_TIMEOUT_MS")?
                .map_or(defaults.provider_timeout, Duration::from_millis),
            consumer_workers: parse("CONSUMER_WORKERS")?
                .map_or(defaults.consumer_workers, |n| n as usize),
            poll_interval: parse("CONSUMER_POLL_INTERVAL_MS")?
                .map_or(defaults.poll_interval, Duration::from_millis),
            message_max_attempts: parse("MESSAGE_MAX_ATTEMPTS")?
                .map_or(defaults.message_max_attempts, |n| n as u32),
            lease_timeout: parse("MESSAGE_LEASE_SECS")?
                .map_or(defaults.lease_timeout, Duration::from_secs),
            publish_retry_attempts: parse("PUBLISH_RETRY_ATTEMPTS")?
                .map_or(defaults.publish_retry_attempts, |n| n as u32),
            publish_retry_base: parse("PUBLISH_RETRY_BASE_MS")?
                .map_or(defaults.publish_retry_base, Duration::from_millis),
            token_retention: parse("TOKEN_RETENTION_HOURS")?
                .map_or(defaults.token_retention, |h| Duration::from_secs(h * 3600)),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            poll_interval: self.poll_interval,
            max_attempts: self.message_max_attempts.max(1),
        }
    }

    pub fn publish_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.publish_retry_attempts.max(1), self.publish_retry_base)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            provider_timeout: Duration::from_secs(10),
            consumer_workers: 2,
            poll_interval: Duration::from_millis(200),
            message_max_attempts: 5,
            lease_timeout: Duration::from_secs(30),
            publish_retry_attempts: 5,
            publish_retry_base: Duration::from_millis(50),
            token_retention: Duration::from_secs(7 * 24 * 3600),
        }
    }
}
