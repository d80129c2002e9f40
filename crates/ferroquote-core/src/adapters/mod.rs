//! Provider adapters.
//!
//! | Adapter | Role | Upstream |
//! |---------|------|----------|
//! | [`TwelveDataAdapter`] | primary | `api.twelvedata.com` |
//! | [`FinnhubAdapter`] | secondary | `finnhub.io/api/v1` |
//! | [`SyntheticProvider`] | terminal fallback | none, generated locally |

pub mod finnhub;
pub mod synthetic;
pub mod twelvedata;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::throttling::QuotaGuard;
use crate::{FetchError, FetchErrorKind, ProviderId};

pub use finnhub::FinnhubAdapter;
pub use synthetic::{SyntheticConfig, SyntheticProvider, MAX_HISTORY_DAYS};
pub use twelvedata::TwelveDataAdapter;

/// Longest slice of an upstream body copied into an error message.
const BODY_SNIPPET_LEN: usize = 160;

/// Authenticated, quota-guarded GET access to one upstream API.
#[derive(Clone)]
pub(crate) struct Upstream {
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    timeout_ms: u64,
    quota: QuotaGuard,
}

impl Upstream {
    pub(crate) fn new(
        provider: ProviderId,
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        auth: HttpAuth,
        quota_per_minute: u32,
    ) -> Self {
        Self {
            provider,
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            auth,
            timeout_ms: 8_000,
            quota: QuotaGuard::per_minute(provider, quota_per_minute),
        }
    }

    pub(crate) fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    pub(crate) fn set_quota_per_minute(&mut self, quota_per_minute: u32) {
        self.quota = QuotaGuard::per_minute(self.provider, quota_per_minute);
    }

    /// Issues `GET {base_url}{path}` and returns the body of a 2xx response.
    pub(crate) async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        self.quota.check()?;

        let mut request = HttpRequest::get(format!("{}{}", self.base_url, path))
            .with_timeout_ms(self.timeout_ms)
            .with_auth(&self.auth);
        for (name, value) in query {
            request = request.with_query(*name, value.clone());
        }

        tracing::debug!(provider = %self.provider, path, "upstream request");
        let response = self.http_client.execute(request).await.map_err(|error| {
            FetchError::transient(
                self.provider,
                format!("{} transport error: {}", self.provider, error.message()),
            )
        })?;

        if !response.is_success() {
            return Err(FetchError::from_status(
                self.provider,
                response.status,
                snippet(&response.body),
            ));
        }

        Ok(response.body)
    }
}

/// Decodes a JSON body; malformed payloads are `Unknown`.
pub(crate) fn decode<T: DeserializeOwned>(provider: ProviderId, body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|error| {
        FetchError::unknown(
            provider,
            format!("failed to parse {provider} response: {error}"),
        )
    })
}

/// Classifies an error reported inside a 2xx body.
///
/// Upstream APIs signal quota and credential problems this way as often as
/// through the status line. A numeric code, when present, wins over the text.
pub(crate) fn body_error(provider: ProviderId, code: Option<u16>, message: &str) -> FetchError {
    let kind = code
        .and_then(FetchErrorKind::from_http_status)
        .unwrap_or_else(|| classify_message(message));
    FetchError::new(
        provider,
        kind,
        format!("{provider} api error: {}", snippet(message)),
    )
}

fn classify_message(message: &str) -> FetchErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("limit") || lower.contains("too many") || lower.contains("credits") {
        FetchErrorKind::RateLimited
    } else if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("token")
        || lower.contains("access")
    {
        FetchErrorKind::Unauthorized
    } else if lower.contains("not found") || lower.contains("invalid symbol") || lower.contains("no data") {
        FetchErrorKind::NotFound
    } else {
        FetchErrorKind::Unknown
    }
}

fn snippet(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

/// A JSON number that some upstreams encode as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value).filter(|v| v.is_finite()),
            Self::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub(crate) fn as_u64(&self) -> Option<u64> {
        self.as_f64()
            .filter(|value| *value >= 0.0)
            .map(|value| value.round() as u64)
    }
}
