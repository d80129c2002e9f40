//! # Ferroquote Core
//!
//! Resilient market data acquisition for quotes, daily history and company
//! profiles.
//!
//! ## Overview
//!
//! A request for `(kind, symbol)` is answered from an in-memory cache when
//! possible. Misses are coalesced so that concurrent callers share one
//! upstream fetch, which walks a provider chain: the primary upstream (retried
//! once on transient failure), then the secondary, then a deterministic
//! synthetic generator that never fails. Stale entries are served immediately
//! while a single background refresh runs.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Twelve Data, Finnhub and synthetic providers |
//! | [`cache`] | Fresh/stale/miss cache with capacity eviction |
//! | [`circuit_breaker`] | Per-provider health tracking |
//! | [`coalesce`] | At-most-one in-flight fetch per key |
//! | [`config`] | Service configuration from the environment |
//! | [`domain`] | Symbols, quotes, bars, profiles and payloads |
//! | [`error`] | Validation, configuration and service errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`provider`] | Provider trait and fetch error taxonomy |
//! | [`retry`] | Retry and backoff policy |
//! | [`routing`] | Provider modes and ordering |
//! | [`service`] | The [`StockDataService`] orchestrator |
//! | [`source`] | Provider identifiers and roles |
//! | [`throttling`] | Per-provider request quotas |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferroquote_core::{ServiceConfig, StockDataService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = StockDataService::new(ServiceConfig::from_env()?);
//!     let payload = service.get_quote("RELIANCE").await?;
//!     if let Some(quote) = payload.as_quote() {
//!         println!("{} {:.2} ({})", quote.symbol, quote.price, payload.provider);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ StockDataService│
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  CacheEngine    │     │   Coalescer      │
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ ProviderRouter  │────▶│ Circuit Breaker  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Provider        │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures are classified by [`FetchErrorKind`]; only the error
//! of a restricted mode, a validation failure or a caller timeout ever
//! reaches the caller as a [`ServiceError`].
//!
//! ```rust
//! use ferroquote_core::{FetchErrorKind, ServiceError};
//!
//! fn needs_operator(error: &ServiceError) -> bool {
//!     match error {
//!         ServiceError::Fetch(fetch) => fetch.kind() == FetchErrorKind::Unauthorized,
//!         ServiceError::Validation(_) | ServiceError::Timeout { .. } => false,
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys come from the environment and are never serialized or logged
//! - All HTTP requests use TLS via rustls

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod coalesce;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod provider;
pub mod retry;
pub mod routing;
pub mod service;
pub mod source;
pub mod throttling;

// Adapter implementations
pub use adapters::{FinnhubAdapter, SyntheticConfig, SyntheticProvider, TwelveDataAdapter};

// Caching
pub use cache::{CacheEngine, CacheKey, CacheLookup, CachePolicy, CacheStats, Expiry};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, HealthSnapshot};

// Coalescing
pub use coalesce::{Coalescer, CoalescerStats};

// Configuration
pub use config::{ProviderCredentials, ServiceConfig};

// Domain models
pub use domain::{
    parse_date, validate_currency_code, Bar, CompanyProfile, DataKind, Payload, PayloadData,
    PriceHistory, Quote, Symbol, UtcDateTime,
};

// Error types
pub use error::{ConfigError, ServiceError, ValidationError};

// HTTP client types
pub use http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Provider contract
pub use provider::{FetchError, FetchErrorKind, FetchFuture, Provider};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Routing types
pub use routing::{ProviderMode, ProviderRouter, ProviderRouterBuilder, ProviderStatus};

// Orchestrator
pub use service::{BatchError, QuoteBatch, ServiceStatus, StockDataService};

// Source identifiers
pub use source::{ProviderId, ProviderRole};

// Throttling
pub use throttling::QuotaGuard;
