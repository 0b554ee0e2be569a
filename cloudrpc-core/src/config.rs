//! Client configuration.
//!
//! Every setting has a default; [`ClientConfig::from_env`] overrides them from the
//! environment:
//!
//! | Variable                     | Setting                          |
//! |------------------------------|----------------------------------|
//! | `CLOUDRPC_PROTO_DIR`         | [`ClientConfig::proto_dir`]      |
//! | `CLOUDRPC_MAX_ATTEMPTS`      | [`RetryConfig::max_attempts`]    |
//! | `CLOUDRPC_RETRY_DELAY_MS`    | [`RetryConfig::initial_delay`]   |
//! | `CLOUDRPC_RETRY_MULTIPLIER`  | [`RetryConfig::multiplier`]      |
//! | `CLOUDRPC_TIMEOUT_MS`        | [`ClientConfig::default_timeout`]|
//! | `GCLOUD_SANDBOX_ENV`         | [`ClientConfig::sandboxed`]      |
use crate::{client::retry::RetryConfig, error::ConfigurationError};
use std::{path::PathBuf, str::FromStr, time::Duration};

pub const PROTO_DIR_VAR: &str = "CLOUDRPC_PROTO_DIR";
pub const MAX_ATTEMPTS_VAR: &str = "CLOUDRPC_MAX_ATTEMPTS";
pub const RETRY_DELAY_VAR: &str = "CLOUDRPC_RETRY_DELAY_MS";
pub const RETRY_MULTIPLIER_VAR: &str = "CLOUDRPC_RETRY_MULTIPLIER";
pub const TIMEOUT_VAR: &str = "CLOUDRPC_TIMEOUT_MS";
pub const SANDBOX_VAR: &str = "GCLOUD_SANDBOX_ENV";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base directory descriptor-set paths are resolved against.
    pub proto_dir: PathBuf,
    pub retry: RetryConfig,
    /// Timeout applied to requests that do not carry their own.
    pub default_timeout: Option<Duration>,
    /// When set, dispatch returns `null` without issuing any call.
    pub sandboxed: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proto_dir: PathBuf::from("protos"),
            retry: RetryConfig::default(),
            default_timeout: None,
            sandboxed: false,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key/value source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(PROTO_DIR_VAR) {
            config.proto_dir = PathBuf::from(dir);
        }

        if let Some(attempts) = parse::<u32>(&lookup, MAX_ATTEMPTS_VAR)? {
            if attempts == 0 {
                return Err(invalid(MAX_ATTEMPTS_VAR, "0", "at least one attempt is required"));
            }
            config.retry.max_attempts = attempts;
        }

        if let Some(delay) = parse::<u64>(&lookup, RETRY_DELAY_VAR)? {
            config.retry.initial_delay = Duration::from_millis(delay);
        }

        if let Some(multiplier) = parse::<f64>(&lookup, RETRY_MULTIPLIER_VAR)? {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(invalid(
                    RETRY_MULTIPLIER_VAR,
                    &multiplier.to_string(),
                    "expected a finite number >= 1.0",
                ));
            }
            config.retry.multiplier = multiplier;
        }

        if let Some(timeout) = parse::<u64>(&lookup, TIMEOUT_VAR)? {
            config.default_timeout = (timeout > 0).then(|| Duration::from_millis(timeout));
        }

        if let Some(sandbox) = lookup(SANDBOX_VAR) {
            config.sandboxed = !sandbox.is_empty();
        }

        Ok(config)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| invalid(key, &value, &e.to_string()))
        })
        .transpose()
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
