//! Stock data service: cache, coalesced fetch and provider fallback behind one call.
//!
//! ```text
//! get_data(kind, symbol)
//!   cache fresh  -> return
//!   cache stale  -> return, refresh in background (one per key)
//!   cache miss   -> coalesce -> primary [retry] -> secondary -> synthetic -> cache -> return
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheEngine, CacheKey, CacheLookup, CacheStats};
use crate::coalesce::{Coalescer, CoalescerStats};
use crate::config::ServiceConfig;
use crate::provider::Provider;
use crate::retry::RetryConfig;
use crate::routing::{ProviderMode, ProviderRouter, ProviderRouterBuilder, ProviderStatus};
use crate::{
    ConfigError, DataKind, FetchError, FetchErrorKind, Payload, ProviderRole, ServiceError, Symbol,
};

/// Read-only operational view of the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub mode: ProviderMode,
    pub cache: CacheStats,
    pub in_flight: usize,
    pub coalescer: CoalescerStats,
    pub providers: Vec<ProviderStatus>,
}

/// A symbol that failed within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub symbol: String,
    pub code: String,
    pub message: String,
}

impl BatchError {
    fn new(symbol: &str, error: &ServiceError) -> Self {
        Self {
            symbol: symbol.to_owned(),
            code: error.code().to_owned(),
            message: error.to_string(),
        }
    }
}

/// Outcome of [`StockDataService::get_quotes`], in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteBatch {
    pub quotes: Vec<Payload>,
    pub errors: Vec<BatchError>,
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct ServiceInner {
    mode: ProviderMode,
    cache: CacheEngine,
    coalescer: Coalescer<CacheKey>,
    router: ProviderRouter,
    retry: RetryConfig,
    request_timeout: Duration,
}

/// Entry point for market data. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct StockDataService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for StockDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockDataService")
            .field("mode", &self.inner.mode)
            .field("router", &self.inner.router)
            .finish_non_exhaustive()
    }
}

impl StockDataService {
    /// Builds the service and its providers from `config`.
    pub fn new(config: ServiceConfig) -> Self {
        let router = ProviderRouterBuilder::from_config(&config).build();
        Self::with_router(&config, router)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        ServiceConfig::from_env().map(Self::new)
    }

    /// Uses `router` in place of the providers `config` would create.
    pub fn with_router(config: &ServiceConfig, router: ProviderRouter) -> Self {
        tracing::info!(mode = %config.mode, capacity = config.cache.capacity, "stock data service ready");
        Self {
            inner: Arc::new(ServiceInner {
                mode: config.mode,
                cache: CacheEngine::new(config.cache),
                coalescer: Coalescer::new(config.mode.lead()),
                router,
                retry: config.retry.clone(),
                request_timeout: config.request_timeout,
            }),
        }
    }

    pub fn mode(&self) -> ProviderMode {
        self.inner.mode
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Fetches `kind` data for `symbol` within the configured request timeout.
    pub async fn get_data(&self, kind: DataKind, symbol: &str) -> Result<Payload, ServiceError> {
        self.get_data_with_timeout(kind, symbol, self.inner.request_timeout)
            .await
    }

    /// Like [`get_data`](Self::get_data) with an explicit caller timeout.
    ///
    /// Expiry only stops this caller from waiting. The fetch keeps running,
    /// serves anyone else attached to it and still writes the cache.
    pub async fn get_data_with_timeout(
        &self,
        kind: DataKind,
        symbol: &str,
        timeout: Duration,
    ) -> Result<Payload, ServiceError> {
        match tokio::time::timeout(timeout, self.lookup(kind, symbol)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%kind, symbol, timeout_ms = timeout.as_millis() as u64, "request timed out");
                Err(ServiceError::Timeout { after: timeout })
            }
        }
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<Payload, ServiceError> {
        self.get_data(DataKind::Quote, symbol).await
    }

    pub async fn get_historical(&self, symbol: &str) -> Result<Payload, ServiceError> {
        self.get_data(DataKind::Historical, symbol).await
    }

    pub async fn get_profile(&self, symbol: &str) -> Result<Payload, ServiceError> {
        self.get_data(DataKind::Profile, symbol).await
    }

    /// Fetches quotes for all `symbols` concurrently. Failures are collected, not raised.
    pub async fn get_quotes<S: AsRef<str>>(&self, symbols: &[S]) -> QuoteBatch {
        let handles = symbols
            .iter()
            .map(|symbol| {
                let symbol = symbol.as_ref().to_owned();
                let service = self.clone();
                let task_symbol = symbol.clone();
                let handle = tokio::spawn(async move { service.get_quote(&task_symbol).await });
                (symbol, handle)
            })
            .collect::<Vec<_>>();

        let mut quotes = Vec::new();
        let mut errors = Vec::new();
        for (symbol, handle) in handles {
            let result = handle.await.unwrap_or_else(|join_error| {
                Err(ServiceError::Fetch(FetchError::unknown(
                    self.inner.mode.lead(),
                    format!("quote task for {symbol} failed: {join_error}"),
                )))
            });
            match result {
                Ok(payload) => quotes.push(payload),
                Err(error) => errors.push(BatchError::new(&symbol, &error)),
            }
        }

        QuoteBatch {
            requested: symbols.len(),
            succeeded: quotes.len(),
            failed: errors.len(),
            quotes,
            errors,
        }
    }

    /// Drops every cached kind for `symbol`; returns how many entries went.
    pub fn invalidate(&self, symbol: &str) -> Result<usize, ServiceError> {
        let symbol = Symbol::parse(symbol)?;
        let removed = self.inner.cache.invalidate_symbol(&symbol);
        tracing::debug!(%symbol, removed, "invalidated symbol");
        Ok(removed)
    }

    pub fn invalidate_all(&self) -> usize {
        self.inner.cache.clear()
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            mode: self.inner.mode,
            cache: self.inner.cache.stats(),
            in_flight: self.inner.coalescer.in_flight(),
            coalescer: self.inner.coalescer.stats(),
            providers: self.inner.router.health_snapshot(),
        }
    }

    async fn lookup(&self, kind: DataKind, symbol: &str) -> Result<Payload, ServiceError> {
        let symbol = Symbol::parse(symbol)?;
        let key = CacheKey::new(kind, symbol);

        match self.inner.cache.get(&key) {
            CacheLookup::Fresh(payload) => {
                tracing::debug!(%key, provider = %payload.provider, "cache hit");
                Ok(payload)
            }
            CacheLookup::Stale(payload) => {
                tracing::debug!(%key, "serving stale entry");
                let inner = Arc::clone(&self.inner);
                let refresh_key = key.clone();
                let started = self.inner.coalescer.spawn(key.clone(), move || async move {
                    inner.run_provider_chain(&refresh_key).await
                });
                if started {
                    tracing::info!(%key, "background refresh started");
                }
                Ok(payload)
            }
            CacheLookup::Miss => {
                tracing::debug!(%key, "cache miss");
                let inner = Arc::clone(&self.inner);
                let fetch_key = key.clone();
                self.inner
                    .coalescer
                    .coalesce(key, move || async move {
                        inner.run_provider_chain(&fetch_key).await
                    })
                    .await
                    .map_err(ServiceError::from)
            }
        }
    }
}

impl ServiceInner {
    /// Walks the providers for this mode and caches the first success.
    async fn run_provider_chain(&self, key: &CacheKey) -> Result<Payload, FetchError> {
        let kind = key.kind();
        let symbol = key.symbol();
        let providers = self.router.providers_for(self.mode, kind);

        if providers.is_empty() {
            let lead = self.mode.lead();
            tracing::error!(provider = %lead, mode = %self.mode, "provider is not configured");
            return Err(FetchError::unauthorized(
                lead,
                format!("{lead} is not configured; set its API key or choose another mode"),
            ));
        }

        // Auto mode goes through each circuit; restricted modes always call their provider.
        let gated = !self.mode.is_restricted();
        let mut last_error = None;
        for provider in providers {
            if gated && !self.router.try_acquire(provider.id()) {
                tracing::debug!(provider = %provider.id(), %key, "circuit refused call, skipping provider");
                continue;
            }
            match self.fetch_from(provider.as_ref(), kind, symbol, gated).await {
                Ok(payload) => {
                    if payload.is_synthetic {
                        tracing::info!(%key, "serving synthetic data");
                    }
                    // Also on a background refresh: once every upstream has failed,
                    // synthetic data replaces the stale entry under its own expiry.
                    self.cache.put(key.clone(), payload.clone());
                    return Ok(payload);
                }
                Err(error) => {
                    if error.kind() == FetchErrorKind::Unauthorized {
                        tracing::error!(provider = %error.provider(), error = %error, "provider rejected credentials");
                    } else {
                        tracing::warn!(provider = %error.provider(), %key, error = %error, "provider failed");
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FetchError::unknown(self.mode.lead(), format!("no provider produced {key}"))
        }))
    }

    /// One provider, retried only when it is the primary and the failure is transient.
    /// A gated retry needs the circuit to admit it again.
    async fn fetch_from(
        &self,
        provider: &dyn Provider,
        kind: DataKind,
        symbol: &Symbol,
        gated: bool,
    ) -> Result<Payload, FetchError> {
        let id = provider.id();
        let is_primary = self.router.role_of(id) == Some(ProviderRole::Primary);
        let mut attempt = 0;

        loop {
            match provider.fetch(kind, symbol).await {
                Ok(payload) => {
                    self.router.record_success(id);
                    return Ok(payload);
                }
                Err(error) => {
                    self.router.record_failure(id, &error);
                    if !is_primary || !self.retry.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(provider = %id, attempt, delay_ms = delay.as_millis() as u64, "retrying primary");
                    tokio::time::sleep(delay).await;
                    if gated && !self.router.try_acquire(id) {
                        tracing::debug!(provider = %id, "circuit opened, abandoning retries");
                        return Err(error);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
