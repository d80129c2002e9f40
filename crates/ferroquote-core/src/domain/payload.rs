use serde::{Deserialize, Serialize};

use crate::{CompanyProfile, DataKind, PriceHistory, ProviderId, Quote, Symbol, UtcDateTime};

/// Typed body of a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PayloadData {
    Quote(Quote),
    Historical(PriceHistory),
    Profile(CompanyProfile),
}

impl PayloadData {
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Quote(_) => DataKind::Quote,
            Self::Historical(_) => DataKind::Historical,
            Self::Profile(_) => DataKind::Profile,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            Self::Quote(quote) => &quote.symbol,
            Self::Historical(history) => &history.symbol,
            Self::Profile(profile) => &profile.symbol,
        }
    }
}

/// Provider-agnostic fetch result, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub provider: ProviderId,
    pub is_synthetic: bool,
    pub fetched_at: UtcDateTime,
    #[serde(flatten)]
    pub data: PayloadData,
}

impl Payload {
    pub fn new(provider: ProviderId, data: PayloadData) -> Self {
        Self {
            provider,
            is_synthetic: false,
            fetched_at: UtcDateTime::now(),
            data,
        }
    }

    /// Marks a payload produced by the fallback generator.
    pub fn synthetic(provider: ProviderId, data: PayloadData) -> Self {
        Self {
            is_synthetic: true,
            ..Self::new(provider, data)
        }
    }

    pub const fn kind(&self) -> DataKind {
        self.data.kind()
    }

    pub fn symbol(&self) -> &Symbol {
        self.data.symbol()
    }

    pub fn as_quote(&self) -> Option<&Quote> {
        match &self.data {
            PayloadData::Quote(quote) => Some(quote),
            _ => None,
        }
    }

    pub fn as_history(&self) -> Option<&PriceHistory> {
        match &self.data {
            PayloadData::Historical(history) => Some(history),
            _ => None,
        }
    }

    pub fn as_profile(&self) -> Option<&CompanyProfile> {
        match &self.data {
            PayloadData::Profile(profile) => Some(profile),
            _ => None,
        }
    }
}
