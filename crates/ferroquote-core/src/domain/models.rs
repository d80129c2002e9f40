use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Symbol, UtcDateTime, ValidationError};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Normalized last-trade quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub previous_close: f64,
    pub volume: Option<u64>,
    pub currency: String,
    pub exchange: Option<String>,
    pub as_of: UtcDateTime,
}

impl Quote {
    /// Builds a quote from price and previous close; change fields are derived.
    pub fn new(
        symbol: Symbol,
        price: f64,
        previous_close: f64,
        volume: Option<u64>,
        currency: impl AsRef<str>,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_non_negative("previous_close", previous_close)?;

        let change = price - previous_close;
        let percent_change = if previous_close > 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };

        Ok(Self {
            symbol,
            price,
            change,
            percent_change,
            previous_close,
            volume,
            currency: validate_currency_code(currency.as_ref())?,
            exchange: None,
            as_of,
        })
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }
}

/// Daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl Bar {
    pub fn new(
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Chronologically ordered daily bars for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: Symbol,
    pub bars: Vec<Bar>,
}

impl PriceHistory {
    /// Sorts bars oldest first so every provider yields the same ordering.
    pub fn new(symbol: Symbol, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|bar| bar.date);
        Self { symbol, bars }
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|bar| bar.close)
    }
}

/// Descriptive company metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: Symbol,
    pub name: String,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub employees: Option<u64>,
    pub website: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
}

impl CompanyProfile {
    pub fn new(symbol: Symbol, name: impl Into<String>) -> Self {
        Self {
            symbol,
            name: name.into(),
            description: None,
            sector: None,
            industry: None,
            market_cap: None,
            employees: None,
            website: None,
            currency: None,
            exchange: None,
        }
    }

    pub fn with_market_cap(mut self, market_cap: Option<f64>) -> Result<Self, ValidationError> {
        validate_optional_non_negative("market_cap", market_cap)?;
        self.market_cap = market_cap;
        Ok(self)
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
