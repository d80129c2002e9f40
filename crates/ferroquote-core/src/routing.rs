use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapters::{FinnhubAdapter, SyntheticConfig, SyntheticProvider, TwelveDataAdapter};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, HealthSnapshot};
use crate::config::{ProviderCredentials, ServiceConfig};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider::Provider;
use crate::{DataKind, FetchError, FetchErrorKind, ProviderId, ProviderRole, ValidationError};

/// Which providers a request may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderMode {
    /// Primary, then secondary, then synthetic.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "primary")]
    PrimaryOnly,
    #[serde(rename = "secondary")]
    SecondaryOnly,
    #[serde(rename = "synthetic")]
    SyntheticOnly,
}

impl ProviderMode {
    pub const ALL: [Self; 4] = [
        Self::Auto,
        Self::PrimaryOnly,
        Self::SecondaryOnly,
        Self::SyntheticOnly,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::PrimaryOnly => "primary",
            Self::SecondaryOnly => "secondary",
            Self::SyntheticOnly => "synthetic",
        }
    }

    /// Restricted modes call their one provider whatever its circuit state,
    /// and never fall back.
    pub const fn is_restricted(self) -> bool {
        !matches!(self, Self::Auto)
    }

    /// Provider the chain starts with in this mode.
    pub const fn lead(self) -> ProviderId {
        match self {
            Self::Auto | Self::PrimaryOnly => ProviderId::TwelveData,
            Self::SecondaryOnly => ProviderId::Finnhub,
            Self::SyntheticOnly => ProviderId::Synthetic,
        }
    }
}

impl Display for ProviderMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "primary" | "primary-only" | "twelvedata" => Ok(Self::PrimaryOnly),
            "secondary" | "secondary-only" | "finnhub" => Ok(Self::SecondaryOnly),
            "synthetic" | "synthetic-only" | "demo" => Ok(Self::SyntheticOnly),
            _ => Err(ValidationError::InvalidProviderMode {
                value: value.to_owned(),
            }),
        }
    }
}

/// Read-only view of one provider slot for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub id: ProviderId,
    pub role: ProviderRole,
    pub configured: bool,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

struct Slot {
    provider: Arc<dyn Provider>,
    health: CircuitBreaker,
}

impl Slot {
    fn new(provider: Arc<dyn Provider>, breaker: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            health: CircuitBreaker::new(breaker),
        }
    }

    fn status(&self, role: ProviderRole) -> ProviderStatus {
        ProviderStatus {
            id: self.provider.id(),
            role,
            configured: true,
            health: self.health.snapshot(),
        }
    }
}

/// Owns the provider set and their health, and orders them per request.
pub struct ProviderRouter {
    primary: Option<Slot>,
    secondary: Option<Slot>,
    synthetic: Slot,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("primary", &self.primary.as_ref().map(|slot| slot.provider.id()))
            .field("secondary", &self.secondary.as_ref().map(|slot| slot.provider.id()))
            .finish_non_exhaustive()
    }
}

impl Default for ProviderRouter {
    /// Synthetic data only; no upstream is configured.
    fn default() -> Self {
        Self::new(
            None,
            None,
            Arc::new(SyntheticProvider::default()),
            CircuitBreakerConfig::default(),
        )
    }
}

impl ProviderRouter {
    pub fn new(
        primary: Option<Arc<dyn Provider>>,
        secondary: Option<Arc<dyn Provider>>,
        synthetic: Arc<dyn Provider>,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            primary: primary.map(|provider| Slot::new(provider, breaker)),
            secondary: secondary.map(|provider| Slot::new(provider, breaker)),
            synthetic: Slot::new(synthetic, breaker),
        }
    }

    /// Ordered providers to try for `kind` under `mode`.
    ///
    /// Auto mode skips upstreams that are missing, cannot serve `kind`, or
    /// whose circuit would refuse a call, and always ends with the synthetic
    /// provider. Restricted modes return their one provider unfiltered, or
    /// nothing when it is not configured. Circuit state is only read here;
    /// see [`ProviderRouter::try_acquire`].
    pub fn providers_for(&self, mode: ProviderMode, kind: DataKind) -> Vec<Arc<dyn Provider>> {
        match mode {
            ProviderMode::Auto => {
                let mut chain = [&self.primary, &self.secondary]
                    .into_iter()
                    .flatten()
                    .filter(|slot| slot.provider.supports(kind))
                    .filter(|slot| {
                        let available = slot.health.is_available();
                        if !available {
                            tracing::debug!(provider = %slot.provider.id(), "circuit open, skipping provider");
                        }
                        available
                    })
                    .map(|slot| Arc::clone(&slot.provider))
                    .collect::<Vec<_>>();
                chain.push(Arc::clone(&self.synthetic.provider));
                chain
            }
            ProviderMode::PrimaryOnly => self
                .primary
                .iter()
                .map(|slot| Arc::clone(&slot.provider))
                .collect(),
            ProviderMode::SecondaryOnly => self
                .secondary
                .iter()
                .map(|slot| Arc::clone(&slot.provider))
                .collect(),
            ProviderMode::SyntheticOnly => vec![Arc::clone(&self.synthetic.provider)],
        }
    }

    pub fn role_of(&self, id: ProviderId) -> Option<ProviderRole> {
        if self.primary.as_ref().is_some_and(|slot| slot.provider.id() == id) {
            Some(ProviderRole::Primary)
        } else if self.secondary.as_ref().is_some_and(|slot| slot.provider.id() == id) {
            Some(ProviderRole::Secondary)
        } else if self.synthetic.provider.id() == id {
            Some(ProviderRole::Synthetic)
        } else {
            None
        }
    }

    pub fn is_configured(&self, role: ProviderRole) -> bool {
        match role {
            ProviderRole::Primary => self.primary.is_some(),
            ProviderRole::Secondary => self.secondary.is_some(),
            ProviderRole::Synthetic => true,
        }
    }

    /// Claims a call through `id`'s circuit right before it is made. Once an
    /// open circuit has cooled down, only the first claimant gets through.
    pub fn try_acquire(&self, id: ProviderId) -> bool {
        self.slot(id).is_none_or(|slot| slot.health.try_acquire())
    }

    pub fn record_success(&self, id: ProviderId) {
        if let Some(slot) = self.slot(id) {
            slot.health.record_success();
        }
    }

    /// Only failures that say the upstream is unwell move the circuit toward open.
    pub fn record_failure(&self, id: ProviderId, error: &FetchError) {
        let Some(slot) = self.slot(id) else {
            return;
        };
        match error.kind() {
            FetchErrorKind::Transient | FetchErrorKind::Unknown => {
                slot.health.record_failure();
                if slot.health.state() == CircuitState::Open {
                    tracing::warn!(provider = %id, "circuit opened after repeated failures");
                }
            }
            FetchErrorKind::RateLimited | FetchErrorKind::NotFound | FetchErrorKind::Unauthorized => {
                slot.health.record_rejection();
            }
        }
    }

    pub fn health_snapshot(&self) -> Vec<ProviderStatus> {
        let unconfigured = |id, role| ProviderStatus {
            id,
            role,
            configured: false,
            health: HealthSnapshot {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                successes: 0,
                failures: 0,
            },
        };

        vec![
            self.primary.as_ref().map_or_else(
                || unconfigured(ProviderId::TwelveData, ProviderRole::Primary),
                |slot| slot.status(ProviderRole::Primary),
            ),
            self.secondary.as_ref().map_or_else(
                || unconfigured(ProviderId::Finnhub, ProviderRole::Secondary),
                |slot| slot.status(ProviderRole::Secondary),
            ),
            self.synthetic.status(ProviderRole::Synthetic),
        ]
    }

    fn slot(&self, id: ProviderId) -> Option<&Slot> {
        [self.primary.as_ref(), self.secondary.as_ref(), Some(&self.synthetic)]
            .into_iter()
            .flatten()
            .find(|slot| slot.provider.id() == id)
    }
}

/// Builder for [`ProviderRouter`].
///
/// Upstream adapters are created only for providers that have an API key;
/// explicit `with_primary`/`with_secondary` overrides take precedence.
///
/// ```rust,ignore
/// let router = ProviderRouterBuilder::from_config(&ServiceConfig::from_env()?).build();
/// ```
#[derive(Default)]
pub struct ProviderRouterBuilder {
    twelvedata: ProviderCredentials,
    finnhub: ProviderCredentials,
    synthetic: SyntheticConfig,
    breaker: CircuitBreakerConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    primary: Option<Arc<dyn Provider>>,
    secondary: Option<Arc<dyn Provider>>,
}

impl ProviderRouterBuilder {
    pub fn new() -> Self {
        Self {
            twelvedata: ProviderCredentials::twelvedata(),
            finnhub: ProviderCredentials::finnhub(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            twelvedata: config.twelvedata.clone(),
            finnhub: config.finnhub.clone(),
            synthetic: config.synthetic.clone(),
            breaker: config.circuit_breaker,
            ..Self::default()
        }
    }

    /// Transport shared by both upstream adapters; defaults to reqwest.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_twelvedata_key(mut self, key: impl Into<String>) -> Self {
        self.twelvedata.api_key = Some(key.into());
        self
    }

    pub fn with_finnhub_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub.api_key = Some(key.into());
        self
    }

    pub fn with_primary(mut self, provider: Arc<dyn Provider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn with_secondary(mut self, provider: Arc<dyn Provider>) -> Self {
        self.secondary = Some(provider);
        self
    }

    pub fn build(self) -> ProviderRouter {
        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let synthetic = &self.synthetic;

        let primary = self.primary.or_else(|| {
            self.twelvedata.key().map(|key| {
                let adapter = TwelveDataAdapter::with_base_url(
                    Arc::clone(&http_client),
                    key,
                    self.twelvedata.base_url.clone(),
                )
                .with_timeout_ms(self.twelvedata.timeout_ms)
                .with_quota_per_minute(self.twelvedata.quota_per_minute)
                .with_exchange(Some(synthetic.exchange.clone()))
                .with_currency(synthetic.currency.clone())
                .with_history_days(synthetic.history_days);
                Arc::new(adapter) as Arc<dyn Provider>
            })
        });

        let secondary = self.secondary.or_else(|| {
            self.finnhub.key().map(|key| {
                let adapter = FinnhubAdapter::with_base_url(
                    Arc::clone(&http_client),
                    key,
                    self.finnhub.base_url.clone(),
                )
                .with_timeout_ms(self.finnhub.timeout_ms)
                .with_quota_per_minute(self.finnhub.quota_per_minute)
                .with_symbol_suffix(finnhub_suffix(&synthetic.exchange))
                .with_exchange(Some(synthetic.exchange.clone()))
                .with_currency(synthetic.currency.clone())
                .with_history_days(synthetic.history_days);
                Arc::new(adapter) as Arc<dyn Provider>
            })
        });

        let synthetic_provider: Arc<dyn Provider> =
            Arc::new(SyntheticProvider::new(self.synthetic.clone()));

        if primary.is_none() {
            tracing::info!("no primary provider configured");
        }
        if secondary.is_none() {
            tracing::info!("no secondary provider configured");
        }

        ProviderRouter::new(primary, secondary, synthetic_provider, self.breaker)
    }
}

/// Finnhub addresses Indian listings by exchange suffix.
fn finnhub_suffix(exchange: &str) -> Option<String> {
    match exchange.to_ascii_uppercase().as_str() {
        "NSE" => Some(String::from(".NS")),
        "BSE" => Some(String::from(".BO")),
        _ => None,
    }
}
