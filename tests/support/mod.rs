//! Shared test doubles for behavior tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ferroquote_core::{
    Bar, CircuitBreakerConfig, CompanyProfile, DataKind, FetchError, FetchErrorKind, FetchFuture,
    HttpClient, HttpError, HttpRequest, HttpResponse, Payload, PayloadData, PriceHistory, Provider,
    ProviderId, ProviderMode, ProviderRouter, Quote, RetryConfig, ServiceConfig, StockDataService,
    Symbol, UtcDateTime,
};

/// One scripted provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Succeed,
    Fail(FetchErrorKind),
}

/// Provider double that replays a script, counts calls and can be slowed down.
///
/// Successful quotes are priced `100 + n` where `n` is the 1-based call number,
/// so a test can tell which fetch produced a payload.
pub struct ScriptedProvider {
    id: ProviderId,
    kinds: Vec<DataKind>,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn succeeding(id: ProviderId) -> Self {
        Self {
            id,
            kinds: DataKind::ALL.to_vec(),
            script: Mutex::new(VecDeque::new()),
            fallback: Step::Succeed,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(id: ProviderId, kind: FetchErrorKind) -> Self {
        Self {
            fallback: Step::Fail(kind),
            ..Self::succeeding(id)
        }
    }

    /// Plays `steps` first, then falls back to the constructor's behavior.
    pub fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..self
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    pub fn supporting(self, kinds: &[DataKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
            ..self
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn payload(&self, kind: DataKind, symbol: &Symbol, call: usize) -> Payload {
        let price = 100.0 + call as f64;
        let data = match kind {
            DataKind::Quote => PayloadData::Quote(
                Quote::new(symbol.clone(), price, 100.0, Some(1_000), "INR", UtcDateTime::now())
                    .expect("valid quote"),
            ),
            DataKind::Historical => {
                let bar = Bar::new(
                    UtcDateTime::now().date(),
                    price,
                    price + 1.0,
                    price - 1.0,
                    price,
                    Some(1_000),
                )
                .expect("valid bar");
                PayloadData::Historical(PriceHistory::new(symbol.clone(), vec![bar]))
            }
            DataKind::Profile => {
                PayloadData::Profile(CompanyProfile::new(symbol.clone(), format!("{symbol} Ltd")))
            }
        };

        if self.id == ProviderId::Synthetic {
            Payload::synthetic(self.id, data)
        } else {
            Payload::new(self.id, data)
        }
    }
}

impl Provider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn supports(&self, kind: DataKind) -> bool {
        self.kinds.contains(&kind)
    }

    fn fetch<'a>(&'a self, kind: DataKind, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let step = self
                .script
                .lock()
                .expect("script should not be poisoned")
                .pop_front()
                .unwrap_or(self.fallback);
            match step {
                Step::Succeed => Ok(self.payload(kind, symbol, call)),
                Step::Fail(error_kind) => Err(FetchError::new(
                    self.id,
                    error_kind,
                    format!("scripted {error_kind} from {}", self.id),
                )),
            }
        })
    }
}

/// The three provider slots of a test service.
pub struct Providers {
    pub primary: Option<Arc<ScriptedProvider>>,
    pub secondary: Option<Arc<ScriptedProvider>>,
    pub synthetic: Arc<ScriptedProvider>,
}

impl Providers {
    pub fn new(primary: ScriptedProvider, secondary: ScriptedProvider) -> Self {
        Self {
            primary: Some(Arc::new(primary)),
            secondary: Some(Arc::new(secondary)),
            synthetic: Arc::new(ScriptedProvider::succeeding(ProviderId::Synthetic)),
        }
    }

    pub fn all_succeeding() -> Self {
        Self::new(
            ScriptedProvider::succeeding(ProviderId::TwelveData),
            ScriptedProvider::succeeding(ProviderId::Finnhub),
        )
    }

    pub fn primary(&self) -> &ScriptedProvider {
        self.primary.as_deref().expect("primary configured")
    }

    pub fn secondary(&self) -> &ScriptedProvider {
        self.secondary.as_deref().expect("secondary configured")
    }

    pub fn router(&self, breaker: CircuitBreakerConfig) -> ProviderRouter {
        ProviderRouter::new(
            self.primary
                .as_ref()
                .map(|provider| Arc::clone(provider) as Arc<dyn Provider>),
            self.secondary
                .as_ref()
                .map(|provider| Arc::clone(provider) as Arc<dyn Provider>),
            Arc::clone(&self.synthetic) as Arc<dyn Provider>,
            breaker,
        )
    }

    pub fn service(&self, config: &ServiceConfig) -> StockDataService {
        StockDataService::with_router(config, self.router(config.circuit_breaker))
    }
}

/// Defaults with a deterministic 100ms retry delay and a generous caller timeout.
pub fn test_config(mode: ProviderMode) -> ServiceConfig {
    ServiceConfig {
        mode,
        retry: RetryConfig::fixed(Duration::from_millis(100), 1),
        request_timeout: Duration::from_secs(60),
        ..ServiceConfig::default()
    }
}

/// Canned-response HTTP client that records every request.
pub struct RecordingHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingHttpClient {
    pub fn new(responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn json(body: &str) -> Arc<Self> {
        Self::new([Ok(HttpResponse::ok_json(body))])
    }

    pub fn recorded(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    pub fn recorded_urls(&self) -> Vec<String> {
        self.recorded().iter().map(HttpRequest::full_url).collect()
    }
}

impl HttpClient for RecordingHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        let response = self
            .responses
            .lock()
            .expect("response queue should not be poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("no canned response left")));
        Box::pin(async move { response })
    }
}

pub fn symbol(input: &str) -> Symbol {
    Symbol::parse(input).expect("valid symbol")
}
