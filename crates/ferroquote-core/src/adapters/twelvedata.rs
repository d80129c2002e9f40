use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{body_error, decode, Numeric, Upstream, MAX_HISTORY_DAYS};
use crate::http_client::{HttpAuth, HttpClient};
use crate::provider::{FetchFuture, Provider};
use crate::{
    parse_date, validate_currency_code, Bar, CompanyProfile, DataKind, FetchError, Payload,
    PayloadData, PriceHistory, ProviderId, Quote, Symbol, UtcDateTime,
};

pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";

/// Free tier allows 8 credits per minute.
pub const DEFAULT_QUOTA_PER_MINUTE: u32 = 8;

const PROVIDER: ProviderId = ProviderId::TwelveData;

/// Primary provider backed by the Twelve Data REST API.
#[derive(Clone)]
pub struct TwelveDataAdapter {
    upstream: Upstream,
    exchange: Option<String>,
    currency: String,
    history_days: usize,
}

impl TwelveDataAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(http_client, api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth = HttpAuth::Query {
            name: String::from("apikey"),
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
            exchange: Some(String::from("NSE")),
            currency: String::from("INR"),
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

    /// Exchange sent with every request; `None` lets the API pick the primary listing.
    pub fn with_exchange(mut self, exchange: Option<String>) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_history_days(mut self, history_days: usize) -> Self {
        self.history_days = history_days.clamp(1, MAX_HISTORY_DAYS);
        self
    }

    fn symbol_query(&self, symbol: &Symbol) -> Vec<(&'static str, String)> {
        let mut query = vec![("symbol", symbol.as_str().to_owned())];
        if let Some(exchange) = &self.exchange {
            query.push(("exchange", exchange.clone()));
        }
        query
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Payload, FetchError> {
        let body = self.upstream.get("/quote", &self.symbol_query(symbol)).await?;
        check_status(&body)?;
        let raw: QuotePayload = decode(PROVIDER, &body)?;

        let price = raw
            .close
            .as_ref()
            .and_then(Numeric::as_f64)
            .ok_or_else(|| FetchError::not_found(PROVIDER, format!("no quote data for {symbol}")))?;
        let previous_close = raw
            .previous_close
            .as_ref()
            .and_then(Numeric::as_f64)
            .unwrap_or(price);
        let as_of = raw
            .timestamp
            .and_then(|seconds| UtcDateTime::from_unix_seconds(seconds).ok())
            .unwrap_or_else(UtcDateTime::now);
        let currency = raw
            .currency
            .as_deref()
            .and_then(|code| validate_currency_code(code).ok())
            .unwrap_or_else(|| self.currency.clone());

        let mut quote = Quote::new(
            symbol.clone(),
            price,
            previous_close,
            raw.volume.as_ref().and_then(Numeric::as_u64),
            currency,
            as_of,
        )
        .map_err(|error| FetchError::unknown(PROVIDER, error.to_string()))?;
        if let Some(exchange) = raw.exchange.or_else(|| self.exchange.clone()) {
            quote = quote.with_exchange(exchange);
        }

        Ok(Payload::new(PROVIDER, PayloadData::Quote(quote)))
    }

    async fn fetch_history(&self, symbol: &Symbol) -> Result<Payload, FetchError> {
        let mut query = self.symbol_query(symbol);
        query.push(("interval", String::from("1day")));
        query.push(("outputsize", self.history_days.to_string()));

        let body = self.upstream.get("/time_series", &query).await?;
        check_status(&body)?;
        let raw: TimeSeriesPayload = decode(PROVIDER, &body)?;

        let bars = raw
            .values
            .iter()
            .filter_map(|value| value.to_bar())
            .collect::<Vec<_>>();
        if bars.is_empty() {
            return Err(FetchError::not_found(
                PROVIDER,
                format!("no price history for {symbol}"),
            ));
        }

        Ok(Payload::new(
            PROVIDER,
            PayloadData::Historical(PriceHistory::new(symbol.clone(), bars)),
        ))
    }

    async fn fetch_profile(&self, symbol: &Symbol) -> Result<Payload, FetchError> {
        let body = self.upstream.get("/profile", &self.symbol_query(symbol)).await?;
        check_status(&body)?;
        let raw: ProfilePayload = decode(PROVIDER, &body)?;

        let name = raw
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| FetchError::not_found(PROVIDER, format!("no profile for {symbol}")))?;

        let mut profile = CompanyProfile::new(symbol.clone(), name)
            .with_market_cap(raw.market_capitalization.as_ref().and_then(Numeric::as_f64))
            .map_err(|error| FetchError::unknown(PROVIDER, error.to_string()))?;
        profile.description = raw.description;
        profile.sector = raw.sector;
        profile.industry = raw.industry;
        profile.employees = raw.employees.as_ref().and_then(Numeric::as_u64);
        profile.website = raw.website;
        profile.exchange = raw.exchange.or_else(|| self.exchange.clone());
        profile.currency = Some(self.currency.clone());

        Ok(Payload::new(PROVIDER, PayloadData::Profile(profile)))
    }
}

impl Provider for TwelveDataAdapter {
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

/// Error envelope: `{"code": 429, "message": "...", "status": "error"}`.
#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: Option<String>,
    code: Option<u16>,
    message: Option<String>,
}

fn check_status(body: &str) -> Result<(), FetchError> {
    let status: StatusPayload = decode(PROVIDER, body)?;
    if status.status.as_deref() == Some("error") {
        return Err(body_error(
            PROVIDER,
            status.code,
            status.message.as_deref().unwrap_or("unknown error"),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QuotePayload {
    close: Option<Numeric>,
    previous_close: Option<Numeric>,
    volume: Option<Numeric>,
    currency: Option<String>,
    exchange: Option<String>,
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesPayload {
    #[serde(default)]
    values: Vec<TimeSeriesValue>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: Numeric,
    high: Numeric,
    low: Numeric,
    close: Numeric,
    volume: Option<Numeric>,
}

impl TimeSeriesValue {
    fn to_bar(&self) -> Option<Bar> {
        Bar::new(
            parse_date(&self.datetime).ok()?,
            self.open.as_f64()?,
            self.high.as_f64()?,
            self.low.as_f64()?,
            self.close.as_f64()?,
            self.volume.as_ref().and_then(Numeric::as_u64),
        )
        .ok()
    }
}

#[derive(Debug, Deserialize)]
struct ProfilePayload {
    name: Option<String>,
    exchange: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
    employees: Option<Numeric>,
    website: Option<String>,
    description: Option<String>,
    market_capitalization: Option<Numeric>,
}
