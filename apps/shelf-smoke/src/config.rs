//! Environment-backed runtime configuration for `shelf-smoke`.

use std::{env, str::FromStr, time::Duration};

use shelf_core::UserId;
use thiserror::Error;

const DEFAULT_LATENCY_MS: u64 = 25;
const DEFAULT_NOTICE_BUFFER: usize = 32;

/// Runtime configuration used by the smoke run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Signed-in user. `None` runs every flow anonymously.
    pub user: Option<UserId>,
    /// Simulated backend latency per call.
    pub latency: Duration,
    /// Inject a server fault into the first favorite toggle.
    pub fail_first_favorite: bool,
    /// Capacity of the notice broadcast channel.
    pub notice_buffer: usize,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            user: Some(UserId(1)),
            latency: Duration::from_millis(DEFAULT_LATENCY_MS),
            fail_first_favorite: true,
            notice_buffer: DEFAULT_NOTICE_BUFFER,
        }
    }
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let user = match lookup("SHELF_SMOKE_USER") {
            None => defaults.user,
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(UserId(parse_value("SHELF_SMOKE_USER", value)?)),
        };
        let latency_ms =
            parse_with_default("SHELF_SMOKE_LATENCY_MS", DEFAULT_LATENCY_MS, &mut lookup)?;
        let fail_first_favorite = match lookup("SHELF_SMOKE_FAIL_FIRST_FAVORITE") {
            None => defaults.fail_first_favorite,
            Some(value) => parse_flag("SHELF_SMOKE_FAIL_FIRST_FAVORITE", value)?,
        };
        let notice_buffer = parse_with_default(
            "SHELF_SMOKE_NOTICE_BUFFER",
            DEFAULT_NOTICE_BUFFER,
            &mut lookup,
        )?;

        if notice_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SHELF_SMOKE_NOTICE_BUFFER",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            user,
            latency: Duration::from_millis(latency_ms),
            fail_first_favorite,
            notice_buffer,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn parse_value<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            reason: err.to_string(),
            value,
        })
}

fn parse_with_default<T, F>(key: &'static str, default: T, lookup: &mut F) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: FnMut(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => parse_value(key, value),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected true or false".to_owned(),
        }),
    }
}
