use std::env;
use std::time::Duration;

use crate::ForecastError;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const BASE_URL_ENV: &str = "COINGECKO_API_URL";
pub const TIMEOUT_ENV: &str = "COINGECKO_TIMEOUT_SECS";

/// Connection settings for the market data client.
///
/// `timeout` is `None` unless set explicitly, which leaves the transport
/// default in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdkConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl SdkConfig {
    /// Read `COINGECKO_API_URL` and `COINGECKO_TIMEOUT_SECS`, falling back to
    /// the public endpoint and the transport default timeout.
    pub fn from_env() -> Result<Self, ForecastError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ForecastError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(BASE_URL_ENV)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = match lookup(TIMEOUT_ENV) {
            Some(raw) => {
                let seconds = raw.trim().parse::<u64>().map_err(|_| {
                    ForecastError::Config(format!(
                        "{TIMEOUT_ENV} must be whole seconds, got {raw:?}"
                    ))
                })?;
                Some(Duration::from_secs(seconds))
            }
            None => None,
        };

        Ok(Self { base_url, timeout })
    }
}
