use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Canonical provider identifiers carried on payloads, errors and status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    TwelveData,
    Finnhub,
    Synthetic,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::TwelveData, Self::Finnhub, Self::Synthetic];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TwelveData => "twelvedata",
            Self::Finnhub => "finnhub",
            Self::Synthetic => "synthetic",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position a provider occupies in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Primary,
    Secondary,
    Synthetic,
}

impl ProviderRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Synthetic => "synthetic",
        }
    }
}

impl Display for ProviderRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
