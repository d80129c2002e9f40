use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{body_error, decode, Numeric, Upstream, MAX_HISTORY_DAYS};
use crate::http_client::{HttpAuth, HttpClient};
use crate::provider::{FetchFuture, Provider};
use crate::{
    validate_currency_code, Bar, CompanyProfile, DataKind, FetchError, Payload, PayloadData,
    PriceHistory, ProviderId, Quote, Symbol, UtcDateTime,
};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Free tier allows 60 calls per minute.
pub const DEFAULT_QUOTA_PER_MINUTE: u32 = 60;

const PROVIDER: ProviderId = ProviderId::Finnhub;
const SECONDS_PER_DAY: i64 = 86_400;

/// Secondary provider backed by the Finnhub REST API.
#[derive(Clone)]
pub struct FinnhubAdapter {
    upstream: Upstream,
    symbol_suffix: Option<String>,
    currency: String,
    exchange: Option<String>,
    history_days: usize,
}

impl FinnhubAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(http_client, api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth = HttpAuth::Query {
            name: String::from("token"),
            value: api_key.into(),
        };
        Self {
            upstream: Upstream::new(
                PROVIDER,
                http_client,
                base_url,
                auth,
                DEFAULT_QUOTA_PER_MINUTE,
            ),
            symbol_suffix: Some(String::from(".NS")),
            currency: String::from("INR"),
            exchange: Some(String::from("NSE")),
            history_days: 30,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.upstream.set_timeout_ms(timeout_ms);
        self
    }

    pub fn with_quota_per_minute(mut self, quota_per_minute: u32) -> Self {
        self.upstream.set_quota_per_minute(quota_per_minute);
        self
    }

    /// Exchange suffix Finnhub expects on listed symbols (`.NS` for NSE).
    pub fn with_symbol_suffix(mut self, suffix: Option<String>) -> Self {
        self.symbol_suffix = suffix;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_exchange(mut self, exchange: Option<String>) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_history_days(mut self, history_days: usize) -> Self {
        self.history_days = history_days.clamp(1, MAX_HISTORY_DAYS);
        self
    }

    fn upstream_symbol(&self, symbol: &Symbol) -> String {
        match &self.symbol_suffix {
            Some(suffix) => format!("{}{}", symbol.as_str(), suffix),
            None => symbol.as_str().to_owned(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        let body = self.upstream.get(path, query).await?;
        let envelope: ErrorPayload = decode(PROVIDER, &body)?;
        if let Some(message) = envelope.error {
            return Err(body_error(PROVIDER, None, &message));
        }
        Ok(body)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Payload, FetchError> {
        let body = self
            .get("/quote", &[("symbol", self.upstream_symbol(symbol))])
            .await?;
        let raw: QuotePayload = decode(PROVIDER, &body)?;

        // Unknown symbols come back as an all-zero quote.
        let price = raw
            .c
            .as_ref()
            .and_then(Numeric::as_f64)
            .filter(|price| *price > 0.0)
            .ok_or_else(|| FetchError::not_found(PROVIDER, format!("no quote data for {symbol}")))?;
        let previous_close = raw
            .pc
            .as_ref()
            .and_then(Numeric::as_f64)
            .filter(|close| *close > 0.0)
            .unwrap_or(price);
        let as_of = raw
            .t
            .filter(|seconds| *seconds > 0)
            .and_then(|seconds| UtcDateTime::from_unix_seconds(seconds).ok())
            .unwrap_or_else(UtcDateTime::now);

        let mut quote = Quote::new(
            symbol.clone(),
            price,
            previous_close,
            None,
            &self.currency,
            as_of,
        )
        .map_err(|error| FetchError::unknown(PROVIDER, error.to_string()))?;
        if let Some(exchange) = &self.exchange {
            quote = quote.with_exchange(exchange.clone());
        }

        Ok(Payload::new(PROVIDER, PayloadData::Quote(quote)))
    }

    async fn fetch_history(&self, symbol: &Symbol) -> Result<Payload, FetchError> {
        let to = UtcDateTime::now().into_inner().unix_timestamp();
        // weekends and holidays leave gaps, so ask for a wider window and keep the tail
        let span_days = (self.history_days as i64).saturating_mul(2).max(7);
        let from = to.saturating_sub(span_days.saturating_mul(SECONDS_PER_DAY));

        let query = [
            ("symbol", self.upstream_symbol(symbol)),
            ("resolution", String::from("D")),
            ("from", from.to_string()),
            ("to", to.to_string()),
        ];
        let body = self.get("/stock/candle", &query).await?;
        let raw: CandlePayload = decode(PROVIDER, &body)?;

        if raw.s != "ok" {
            return Err(FetchError::not_found(
                PROVIDER,
                format!("no price history for {symbol} (status '{}')", raw.s),
            ));
        }

        let bars = raw.to_bars();
        if bars.is_empty() {
            return Err(FetchError::not_found(
                PROVIDER,
                format!("no price history for {symbol}"),
            ));
        }

        let mut history = PriceHistory::new(symbol.clone(), bars);
        let excess = history.bars.len().saturating_sub(self.history_days);
        history.bars.drain(..excess);

        Ok(Payload::new(PROVIDER, PayloadData::Historical(history)))
    }

    async fn fetch_profile(&self, symbol: &Symbol) -> Result<Payload, FetchError> {
        let body = self
            .get("/stock/profile2", &[("symbol", self.upstream_symbol(symbol))])
            .await?;
        let raw: ProfilePayload = decode(PROVIDER, &body)?;

        let name = raw
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| FetchError::not_found(PROVIDER, format!("no profile for {symbol}")))?;

        // reported in millions
        let market_cap = raw
            .market_capitalization
            .as_ref()
            .and_then(Numeric::as_f64)
            .map(|millions| millions * 1_000_000.0);

        let mut profile = CompanyProfile::new(symbol.clone(), name)
            .with_market_cap(market_cap)
            .map_err(|error| FetchError::unknown(PROVIDER, error.to_string()))?;
        profile.sector = raw.finnhub_industry;
        profile.industry = raw.gsubind;
        profile.employees = raw.employee_total.as_ref().and_then(Numeric::as_u64);
        profile.website = raw.weburl.filter(|url| !url.is_empty());
        profile.currency = raw
            .currency
            .as_deref()
            .and_then(|code| validate_currency_code(code).ok())
            .or_else(|| Some(self.currency.clone()));
        profile.exchange = raw.exchange.or_else(|| self.exchange.clone());

        Ok(Payload::new(PROVIDER, PayloadData::Profile(profile)))
    }
}

impl Provider for FinnhubAdapter {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    fn supports(&self, _kind: DataKind) -> bool {
        true
    }

    fn fetch<'a>(&'a self, kind: DataKind, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move {
            match kind {
                DataKind::Quote => self.fetch_quote(symbol).await,
                DataKind::Historical => self.fetch_history(symbol).await,
                DataKind::Profile => self.fetch_profile(symbol).await,
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

/// `c` current, `pc` previous close, `t` unix time of the last trade.
#[derive(Debug, Deserialize)]
struct QuotePayload {
    c: Option<Numeric>,
    pc: Option<Numeric>,
    t: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CandlePayload {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

impl CandlePayload {
    fn to_bars(&self) -> Vec<Bar> {
        self.t
            .iter()
            .enumerate()
            .filter_map(|(index, seconds)| {
                let date = UtcDateTime::from_unix_seconds(*seconds).ok()?.date();
                let volume = self
                    .v
                    .get(index)
                    .filter(|volume| volume.is_finite() && **volume >= 0.0)
                    .map(|volume| volume.round() as u64);
                Bar::new(
                    date,
                    *self.o.get(index)?,
                    *self.h.get(index)?,
                    *self.l.get(index)?,
                    *self.c.get(index)?,
                    volume,
                )
                .ok()
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePayload {
    name: Option<String>,
    currency: Option<String>,
    exchange: Option<String>,
    finnhub_industry: Option<String>,
    gsubind: Option<String>,
    market_capitalization: Option<Numeric>,
    employee_total: Option<Numeric>,
    weburl: Option<String>,
}
