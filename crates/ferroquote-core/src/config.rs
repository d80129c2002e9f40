//! Service configuration.
//!
//! Every setting has a default, so an empty environment yields a working
//! service that serves synthetic data. Variables are read with a
//! `FERROQUOTE_` prefix; provider keys and the mode also accept the bare
//! names other tools use.

use std::env;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::{finnhub, twelvedata, SyntheticConfig, MAX_HISTORY_DAYS};
use crate::cache::{CachePolicy, Expiry};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryConfig;
use crate::routing::ProviderMode;
use crate::{ConfigError, DataKind};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 8_000;

/// Connection settings for one upstream provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_ms: u64,
    pub quota_per_minute: u32,
}

impl ProviderCredentials {
    pub fn twelvedata() -> Self {
        Self {
            api_key: None,
            base_url: String::from(twelvedata::DEFAULT_BASE_URL),
            timeout_ms: DEFAULT_UPSTREAM_TIMEOUT_MS,
            quota_per_minute: twelvedata::DEFAULT_QUOTA_PER_MINUTE,
        }
    }

    pub fn finnhub() -> Self {
        Self {
            api_key: None,
            base_url: String::from(finnhub::DEFAULT_BASE_URL),
            timeout_ms: DEFAULT_UPSTREAM_TIMEOUT_MS,
            quota_per_minute: finnhub::DEFAULT_QUOTA_PER_MINUTE,
        }
    }

    /// The API key, if one is set and not blank.
    pub fn key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for ProviderCredentials {
    fn default() -> Self {
        Self::twelvedata()
    }
}

impl Debug for ProviderCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &self.key().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("quota_per_minute", &self.quota_per_minute)
            .finish()
    }
}

/// Everything needed to build a [`StockDataService`](crate::StockDataService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub mode: ProviderMode,
    pub cache: CachePolicy,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Default caller timeout for `get_data`.
    pub request_timeout: Duration,
    pub twelvedata: ProviderCredentials,
    pub finnhub: ProviderCredentials,
    pub synthetic: SyntheticConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: ProviderMode::default(),
            cache: CachePolicy::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            twelvedata: ProviderCredentials::twelvedata(),
            finnhub: ProviderCredentials::finnhub(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };
        let mut config = Self::default();

        if let Some(value) = vars.first(&["FERROQUOTE_PROVIDER_MODE", "STOCK_PROVIDER"]) {
            config.mode = value.parse::<ProviderMode>()?;
        }

        config.twelvedata.api_key =
            vars.first(&["FERROQUOTE_TWELVEDATA_API_KEY", "TWELVEDATA_API_KEY"]);
        config.finnhub.api_key = vars.first(&["FERROQUOTE_FINNHUB_API_KEY", "FINNHUB_API_KEY"]);
        if let Some(url) = vars.get("FERROQUOTE_TWELVEDATA_BASE_URL") {
            config.twelvedata.base_url = url;
        }
        if let Some(url) = vars.get("FERROQUOTE_FINNHUB_BASE_URL") {
            config.finnhub.base_url = url;
        }
        if let Some(ms) = vars.parse::<u64>("FERROQUOTE_UPSTREAM_TIMEOUT_MS")? {
            config.twelvedata.timeout_ms = ms;
            config.finnhub.timeout_ms = ms;
        }

        if let Some(capacity) = vars.parse::<usize>("FERROQUOTE_CACHE_CAPACITY")? {
            config.cache.capacity = capacity;
        }
        config.cache.quote = vars.expiry("QUOTE", config.cache.quote)?;
        config.cache.historical = vars.expiry("HISTORICAL", config.cache.historical)?;
        config.cache.profile = vars.expiry("PROFILE", config.cache.profile)?;
        config.cache.synthetic = vars.expiry("SYNTHETIC", config.cache.synthetic)?;

        if let Some(retries) = vars.parse::<u32>("FERROQUOTE_RETRY_COUNT")? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = vars.parse::<u64>("FERROQUOTE_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }

        if let Some(threshold) = vars.parse::<u32>("FERROQUOTE_CIRCUIT_FAILURE_THRESHOLD")? {
            if threshold == 0 {
                return Err(invalid(
                    "FERROQUOTE_CIRCUIT_FAILURE_THRESHOLD",
                    "0",
                    "must be at least 1",
                ));
            }
            config.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(secs) = vars.parse::<u64>("FERROQUOTE_CIRCUIT_OPEN_SECS")? {
            config.circuit_breaker.open_timeout = Duration::from_secs(secs);
        }

        if let Some(days) = vars.parse::<usize>("FERROQUOTE_HISTORY_DAYS")? {
            if !(1..=MAX_HISTORY_DAYS).contains(&days) {
                return Err(invalid(
                    "FERROQUOTE_HISTORY_DAYS",
                    &days.to_string(),
                    format!("must be between 1 and {MAX_HISTORY_DAYS}"),
                ));
            }
            config.synthetic.history_days = days;
        }

        Ok(config)
    }

    pub fn expiry_for(&self, kind: DataKind) -> Expiry {
        self.cache.expiry_for(kind)
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn first(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.get(name))
    }

    fn parse<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|error| invalid(name, &value, error.to_string()))
            })
            .transpose()
    }

    fn expiry(&self, kind: &'static str, current: Expiry) -> Result<Expiry, ConfigError> {
        let (ttl_name, grace_name) = expiry_names(kind);
        let ttl = self.parse::<u64>(ttl_name)?.map(Duration::from_secs);
        let grace = self.parse::<u64>(grace_name)?.map(Duration::from_secs);
        Ok(Expiry::new(
            ttl.unwrap_or(current.ttl),
            grace.unwrap_or(current.grace),
        ))
    }
}

fn expiry_names(kind: &str) -> (&'static str, &'static str) {
    match kind {
        "QUOTE" => ("FERROQUOTE_QUOTE_TTL_SECS", "FERROQUOTE_QUOTE_GRACE_SECS"),
        "HISTORICAL" => (
            "FERROQUOTE_HISTORICAL_TTL_SECS",
            "FERROQUOTE_HISTORICAL_GRACE_SECS",
        ),
        "PROFILE" => ("FERROQUOTE_PROFILE_TTL_SECS", "FERROQUOTE_PROFILE_GRACE_SECS"),
        _ => (
            "FERROQUOTE_SYNTHETIC_TTL_SECS",
            "FERROQUOTE_SYNTHETIC_GRACE_SECS",
        ),
    }
}

fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: value.to_owned(),
        reason: reason.into(),
    }
}
