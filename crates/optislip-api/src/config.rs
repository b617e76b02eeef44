use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use optislip_core::services::SyncOptions;
use optislip_core::sync::DispatchConfig;
use thiserror::Error;

/// Shortest accepted HS256 secret, in bytes.
const MIN_JWT_SECRET_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub auth_clock_skew: Duration,
    pub sync_batch_limit: usize,
    pub sync_default_max_attempts: u32,
    pub sync_processing_timeout: Duration,
    pub sync_fail_fast_on_permanent: bool,
    /// Background dispatch period; `None` disables the loop
    pub auto_dispatch_interval: Option<Duration>,
    pub rate_limit_window: Duration,
    pub enqueue_rate_limit_per_window: u32,
    pub dispatch_rate_limit_per_window: u32,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("sync_batch_limit", &self.sync_batch_limit)
            .field("sync_default_max_attempts", &self.sync_default_max_attempts)
            .field("sync_processing_timeout", &self.sync_processing_timeout)
            .field(
                "sync_fail_fast_on_permanent",
                &self.sync_fail_fast_on_permanent,
            )
            .field("auto_dispatch_interval", &self.auto_dispatch_interval)
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "enqueue_rate_limit_per_window",
                &self.enqueue_rate_limit_per_window,
            )
            .field(
                "dispatch_rate_limit_per_window",
                &self.dispatch_rate_limit_per_window,
            )
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "OPTISLIP_API_BIND_ADDR", "127.0.0.1:8080");
        let database_path =
            PathBuf::from(value_or_default(&lookup, "OPTISLIP_DATABASE_PATH", "optislip.db"));

        let jwt_secret = required_trimmed(&lookup, "JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters"
            )));
        }

        let auth_clock_skew_secs = ranged(&lookup, "AUTH_CLOCK_SKEW_SECS", 60, 0..=300)?;
        let sync_batch_limit = ranged(&lookup, "SYNC_BATCH_LIMIT", 50, 1..=500)?;
        let sync_default_max_attempts = ranged(&lookup, "SYNC_DEFAULT_MAX_ATTEMPTS", 5, 1..=100)?;
        let processing_timeout_secs =
            ranged(&lookup, "SYNC_PROCESSING_TIMEOUT_SECS", 300, 10..=86_400)?;

        let sync_fail_fast_on_permanent =
            match value_or_default(&lookup, "SYNC_FAIL_FAST_ON_PERMANENT", "false")
                .to_ascii_lowercase()
                .as_str()
            {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid(
                        "SYNC_FAIL_FAST_ON_PERMANENT must be true or false".to_string(),
                    ))
                }
            };

        let auto_dispatch_interval =
            match optional_trimmed(&lookup, "SYNC_AUTO_DISPATCH_INTERVAL_SECS") {
                Some(raw) => Some(Duration::from_secs(parse_in_range(
                    "SYNC_AUTO_DISPATCH_INTERVAL_SECS",
                    &raw,
                    5..=3_600,
                )?)),
                None => None,
            };

        let rate_limit_window_secs = ranged(&lookup, "RATE_LIMIT_WINDOW_SECS", 60, 10..=3_600)?;
        let enqueue_rate_limit_per_window =
            ranged(&lookup, "SYNC_ENQUEUE_RATE_LIMIT_PER_WINDOW", 120, 1..=5_000)?;
        let dispatch_rate_limit_per_window =
            ranged(&lookup, "SYNC_DISPATCH_RATE_LIMIT_PER_WINDOW", 30, 1..=1_000)?;

        Ok(Self {
            bind_addr,
            database_path,
            jwt_secret,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            sync_batch_limit,
            sync_default_max_attempts,
            sync_processing_timeout: Duration::from_secs(processing_timeout_secs),
            sync_fail_fast_on_permanent,
            auto_dispatch_interval,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            enqueue_rate_limit_per_window,
            dispatch_rate_limit_per_window,
        })
    }

    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dispatch: DispatchConfig {
                batch_limit: self.sync_batch_limit,
                processing_timeout: self.sync_processing_timeout,
                fail_fast_on_permanent: self.sync_fail_fast_on_permanent,
            },
            default_max_attempts: self.sync_default_max_attempts,
        }
    }
}

fn ranged<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + fmt::Display + Copy,
{
    match optional_trimmed(lookup, name) {
        Some(raw) => parse_in_range(name, &raw, range),
        None => Ok(default),
    }
}

fn parse_in_range<T>(name: &str, raw: &str, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + fmt::Display + Copy,
{
    let (low, high) = (*range.start(), *range.end());
    let value = raw.parse::<T>().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be an integer in [{low}, {high}]"))
    })?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{low}, {high}]"
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_requires_jwt_secret() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = config_from(&[("JWT_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 16"));
    }

    #[test]
    fn config_applies_defaults() {
        let config = config_from(&[("JWT_SECRET", "0123456789abcdef0123")]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, PathBuf::from("optislip.db"));
        assert_eq!(config.auth_clock_skew, Duration::from_secs(60));
        assert_eq!(config.sync_batch_limit, 50);
        assert_eq!(config.sync_default_max_attempts, 5);
        assert_eq!(config.sync_processing_timeout, Duration::from_secs(300));
        assert!(!config.sync_fail_fast_on_permanent);
        assert_eq!(config.auto_dispatch_interval, None);
        assert_eq!(config.enqueue_rate_limit_per_window, 120);
        assert_eq!(config.dispatch_rate_limit_per_window, 30);
        assert_eq!(config.sync_options().dispatch, DispatchConfig::default());
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        for (name, value) in [
            ("SYNC_BATCH_LIMIT", "0"),
            ("SYNC_BATCH_LIMIT", "many"),
            ("SYNC_DEFAULT_MAX_ATTEMPTS", "101"),
            ("AUTH_CLOCK_SKEW_SECS", "301"),
            ("SYNC_AUTO_DISPATCH_INTERVAL_SECS", "1"),
            ("SYNC_FAIL_FAST_ON_PERMANENT", "maybe"),
        ] {
            let err = config_from(&[("JWT_SECRET", "0123456789abcdef0123"), (name, value)])
                .unwrap_err();
            assert!(err.to_string().contains(name), "{name}={value}: {err}");
        }
    }

    #[test]
    fn config_reads_sync_tuning() {
        let config = config_from(&[
            ("JWT_SECRET", "0123456789abcdef0123"),
            ("SYNC_BATCH_LIMIT", "10"),
            ("SYNC_FAIL_FAST_ON_PERMANENT", "true"),
            ("SYNC_AUTO_DISPATCH_INTERVAL_SECS", "30"),
        ])
        .unwrap();
        let options = config.sync_options();
        assert_eq!(options.dispatch.batch_limit, 10);
        assert!(options.dispatch.fail_fast_on_permanent);
        assert_eq!(config.auto_dispatch_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn config_redacts_sensitive_debug_fields() {
        let config = config_from(&[("JWT_SECRET", "sensitive-signing-secret")]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-signing-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
