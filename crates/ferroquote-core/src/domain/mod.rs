//! # Domain Models
//!
//! Canonical domain types shared by providers, the cache and the service.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DataKind`] | Quote, historical or profile data |
//! | [`Symbol`] | Normalized ticker (uppercase, exchange suffix stripped) |
//! | [`Quote`] | Last price with change against previous close |
//! | [`Bar`] / [`PriceHistory`] | Daily OHLCV series |
//! | [`CompanyProfile`] | Descriptive company metadata |
//! | [`Payload`] | Provider-tagged fetch result, possibly synthetic |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All constructors validate their invariants and return [`ValidationError`](crate::ValidationError)
//! on bad input, so providers cannot hand malformed data to the cache.

mod kind;
mod models;
mod payload;
mod symbol;
mod timestamp;

pub use kind::DataKind;
pub use models::{validate_currency_code, Bar, CompanyProfile, PriceHistory, Quote};
pub use payload::{Payload, PayloadData};
pub use symbol::Symbol;
pub use timestamp::{parse_date, UtcDateTime};
