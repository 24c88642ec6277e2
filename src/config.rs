//! Runtime configuration read from the environment (and `.env` via dotenvy).

use std::time::Duration;
use thiserror::Error;

use crate::backend::types::RateAddress;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NOTICE_TTL_SECS: u64 = 4;

#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: String,
    pub backend_token: Option<String>,
    pub request_timeout: Duration,
    pub notice_ttl: Duration,
    /// Origin address sent with every shipping rate query.
    pub ship_from: RateAddress,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            notice_ttl: Duration::from_secs(DEFAULT_NOTICE_TTL_SECS),
            ship_from: RateAddress::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let seconds = |key: &'static str, fallback: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                None => Ok(fallback),
                Some(value) => value
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::InvalidSeconds { key, value }),
            }
        };

        let ship_from = RateAddress {
            name: get("SHIP_FROM_NAME").unwrap_or_default(),
            street1: get("SHIP_FROM_STREET").unwrap_or_default(),
            city: get("SHIP_FROM_CITY").unwrap_or_default(),
            state: get("SHIP_FROM_STATE").unwrap_or_default(),
            zip: get("SHIP_FROM_ZIP").unwrap_or_default(),
            country: get("SHIP_FROM_COUNTRY").unwrap_or_default(),
            email: get("SHIP_FROM_EMAIL").unwrap_or_default(),
            phone: get("SHIP_FROM_PHONE").unwrap_or_default(),
        };

        Ok(Self {
            backend_url: get("BACKEND_URL").unwrap_or(defaults.backend_url),
            backend_token: get("BACKEND_TOKEN"),
            request_timeout: seconds("REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            notice_ttl: seconds("NOTICE_TTL_SECS", defaults.notice_ttl)?,
            ship_from,
        })
    }
}
