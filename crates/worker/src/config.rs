//! Worker configuration loaded from environment variables.

use std::net::SocketAddr;

use common::{Classify, FailureKind};
use projections::RetentionPolicy;
use thiserror::Error;

const MAX_TTL_DAYS: i64 = 36_500;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `LOG_LEVEL`: tracing filter used when `RUST_LOG` is unset (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; in-memory stores are used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `PROCESSED_EVENT_TTL_DAYS`: dedupe retention (default: `90`)
/// - `PURGE_INTERVAL_SECS`: how often expired dedupe records are purged (default: `3600`)
/// - `MAX_DELIVERY_ATTEMPTS`: deliveries per event before giving up (default: `5`)
/// - `PUBLISH_RETRY_ATTEMPTS`: publish-only retries after a stored command (default: `3`)
/// - `METRICS_ADDR`: Prometheus scrape address; metrics are not exported when unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub processed_event_ttl_days: i64,
    pub purge_interval_secs: u64,
    pub max_delivery_attempts: u32,
    pub publish_retry_attempts: u32,
    pub metrics_addr: Option<SocketAddr>,
}

/// A configuration value that could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Classify for ConfigError {
    fn kind(&self) -> FailureKind {
        FailureKind::Validation
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get("LOG_FORMAT").as_deref() {
            None => defaults.log_format,
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: v.to_string(),
                    reason: "expected text or json".to_string(),
                });
            }
        };

        let config = Self {
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse("DATABASE_MAX_CONNECTIONS", &get)?
                .unwrap_or(defaults.database_max_connections),
            processed_event_ttl_days: parse("PROCESSED_EVENT_TTL_DAYS", &get)?
                .unwrap_or(defaults.processed_event_ttl_days),
            purge_interval_secs: parse("PURGE_INTERVAL_SECS", &get)?
                .unwrap_or(defaults.purge_interval_secs),
            max_delivery_attempts: parse("MAX_DELIVERY_ATTEMPTS", &get)?
                .unwrap_or(defaults.max_delivery_attempts),
            publish_retry_attempts: parse("PUBLISH_RETRY_ATTEMPTS", &get)?
                .unwrap_or(defaults.publish_retry_attempts),
            metrics_addr: parse("METRICS_ADDR", &get)?,
        };

        config.check()?;
        Ok(config)
    }

    /// Retention applied to processed-event records.
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::days(self.processed_event_ttl_days)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let positive = [
            (
                "DATABASE_MAX_CONNECTIONS",
                i128::from(self.database_max_connections),
            ),
            (
                "PROCESSED_EVENT_TTL_DAYS",
                i128::from(self.processed_event_ttl_days),
            ),
            ("PURGE_INTERVAL_SECS", i128::from(self.purge_interval_secs)),
            ("MAX_DELIVERY_ATTEMPTS", i128::from(self.max_delivery_attempts)),
        ];
        for (name, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                    reason: "must be greater than 0".to_string(),
                });
            }
        }
        if self.processed_event_ttl_days > MAX_TTL_DAYS {
            return Err(ConfigError::Invalid {
                name: "PROCESSED_EVENT_TTL_DAYS",
                value: self.processed_event_ttl_days.to_string(),
                reason: format!("must be at most {MAX_TTL_DAYS}"),
            });
        }
        Ok(())
    }
}

fn parse<T, G>(name: &'static str, get: &G) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            processed_event_ttl_days: 90,
            purge_interval_secs: 3600,
            max_delivery_attempts: 5,
            publish_retry_attempts: 3,
            metrics_addr: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.processed_event_ttl_days, 90);
        assert_eq!(config.max_delivery_attempts, 5);
        assert_eq!(config.publish_retry_attempts, 3);
        assert!(config.database_url.is_none());
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("DATABASE_MAX_CONNECTIONS", "10"),
            ("PROCESSED_EVENT_TTL_DAYS", "7"),
            ("MAX_DELIVERY_ATTEMPTS", "2"),
            ("PUBLISH_RETRY_ATTEMPTS", "0"),
            ("METRICS_ADDR", "127.0.0.1:9100"),
        ])
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/orders")
        );
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.retention(), RetentionPolicy::days(7));
        assert_eq!(config.max_delivery_attempts, 2);
        assert_eq!(config.publish_retry_attempts, 0);
        assert_eq!(
            config.metrics_addr,
            Some("127.0.0.1:9100".parse().unwrap())
        );
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = load(&[("DATABASE_URL", ""), ("MAX_DELIVERY_ATTEMPTS", " ")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.max_delivery_attempts, 5);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let err = load(&[("MAX_DELIVERY_ATTEMPTS", "lots")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "MAX_DELIVERY_ATTEMPTS",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let err = load(&[("PROCESSED_EVENT_TTL_DAYS", "0")]).unwrap_err();
        assert!(err.to_string().contains("PROCESSED_EVENT_TTL_DAYS"));
    }

    #[test]
    fn test_large_unsigned_values_are_accepted() {
        let config = load(&[
            ("PURGE_INTERVAL_SECS", "18446744073709551615"),
            ("DATABASE_MAX_CONNECTIONS", "4294967295"),
        ])
        .unwrap();
        assert_eq!(config.purge_interval_secs, u64::MAX);
        assert_eq!(config.database_max_connections, u32::MAX);
    }

    #[test]
    fn test_zero_purge_interval_is_rejected() {
        let err = load(&[("PURGE_INTERVAL_SECS", "0")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "PURGE_INTERVAL_SECS",
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
