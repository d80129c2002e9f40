//! Provider contract and fetch error taxonomy.
//!
//! Every upstream source, and the synthetic generator that terminates the
//! fallback chain, implements [`Provider`]. Only the normalized [`Payload`]
//! and [`FetchError`] cross this boundary; request and response shapes of the
//! upstream APIs stay inside each adapter.
//!
//! # Error kinds
//!
//! | Kind | Meaning | Chain behavior |
//! |------|---------|----------------|
//! | `Transient` | network failure, timeout, 5xx | retried once on the primary |
//! | `RateLimited` | quota exhausted | next provider immediately |
//! | `NotFound` | symbol unknown to this provider | next provider |
//! | `Unauthorized` | credential failure | next provider, logged as a config alert |
//! | `Unknown` | unclassified | next provider |
//!
//! # Example
//!
//! ```rust,ignore
//! use ferroquote_core::{DataKind, Provider, SyntheticProvider, Symbol};
//!
//! async fn demo(provider: &SyntheticProvider) {
//!     let symbol = Symbol::parse("RELIANCE").expect("valid");
//!     let payload = provider.fetch(DataKind::Quote, &symbol).await.expect("never fails");
//!     assert!(payload.is_synthetic);
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{DataKind, Payload, ProviderId, Symbol};

/// Boxed future returned by [`Provider::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Payload, FetchError>> + Send + 'a>>;

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Transient,
    RateLimited,
    NotFound,
    Unauthorized,
    Unknown,
}

impl FetchErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Unknown => "unknown",
        }
    }

    /// Classifies an upstream HTTP status; `None` for success codes.
    pub const fn from_http_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            429 => Some(Self::RateLimited),
            401 | 403 => Some(Self::Unauthorized),
            404 => Some(Self::NotFound),
            408 | 500..=599 => Some(Self::Transient),
            _ => Some(Self::Unknown),
        }
    }
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured provider error used by the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchError {
    provider: ProviderId,
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn new(provider: ProviderId, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn transient(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::new(provider, FetchErrorKind::Transient, message)
    }

    pub fn rate_limited(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::new(provider, FetchErrorKind::RateLimited, message)
    }

    pub fn not_found(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::new(provider, FetchErrorKind::NotFound, message)
    }

    pub fn unauthorized(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::new(provider, FetchErrorKind::Unauthorized, message)
    }

    pub fn unknown(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::new(provider, FetchErrorKind::Unknown, message)
    }

    /// Error for a data kind the provider does not serve.
    pub fn unsupported(provider: ProviderId, kind: DataKind) -> Self {
        Self::not_found(
            provider,
            format!("data kind '{kind}' is not supported by {provider}"),
        )
    }

    /// Error for an upstream HTTP status outside the 2xx range.
    pub fn from_status(provider: ProviderId, status: u16, detail: &str) -> Self {
        let kind = FetchErrorKind::from_http_status(status).unwrap_or(FetchErrorKind::Unknown);
        let message = if detail.trim().is_empty() {
            format!("{provider} upstream returned status {status}")
        } else {
            format!("{provider} upstream returned status {status}: {}", detail.trim())
        };
        Self::new(provider, kind, message)
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Only transient failures are worth repeating against the same provider.
    pub const fn retryable(&self) -> bool {
        matches!(self.kind, FetchErrorKind::Transient)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Transient => "fetch.transient",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::NotFound => "fetch.not_found",
            FetchErrorKind::Unauthorized => "fetch.unauthorized",
            FetchErrorKind::Unknown => "fetch.unknown",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.provider, self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Data provider contract.
///
/// Implementations hold no request-scoped mutable state and are shared across
/// concurrent calls as `Arc<dyn Provider>`. Health tracking and quotas, where
/// present, are internally synchronized.
pub trait Provider: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Whether this provider can serve the given data kind.
    fn supports(&self, kind: DataKind) -> bool;

    /// Fetches one payload for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classified by [`FetchErrorKind`]. The synthetic
    /// provider never returns an error.
    fn fetch<'a>(&'a self, kind: DataKind, symbol: &'a Symbol) -> FetchFuture<'a>;
}
