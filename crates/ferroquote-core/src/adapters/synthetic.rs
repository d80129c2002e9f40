//! Locally generated market data, used when every real provider has failed.
//!
//! Output is a pure function of `(symbol, hour)`: repeated calls within the
//! same hour agree with each other, so a consumer polling the fallback does
//! not see prices jitter on every request.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::provider::{FetchFuture, Provider};
use crate::{
    Bar, CompanyProfile, DataKind, Payload, PayloadData, PriceHistory, ProviderId, Quote, Symbol,
    UtcDateTime,
};

/// Largest single-day move.
const MAX_DAILY_MOVE: f64 = 0.05;
/// Prices never leave `base * (1 ± MAX_DRIFT)`.
const MAX_DRIFT: f64 = 0.20;
/// Upper bound on generated or requested daily history, about ten years.
pub const MAX_HISTORY_DAYS: usize = 3_650;

/// Settings for generated payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub currency: String,
    pub exchange: String,
    pub history_days: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            currency: String::from("INR"),
            exchange: String::from("NSE"),
            history_days: 30,
        }
    }
}

struct Listing {
    symbol: &'static str,
    name: &'static str,
    base_price: f64,
    volatility: f64,
    volume_range: (u64, u64),
    market_cap: f64,
    sector: &'static str,
    industry: &'static str,
}

const LISTINGS: &[Listing] = &[
    Listing {
        symbol: "RELIANCE",
        name: "Reliance Industries Limited",
        base_price: 2950.0,
        volatility: 0.02,
        volume_range: (5_000_000, 15_000_000),
        market_cap: 19.5e12,
        sector: "Oil & Gas",
        industry: "Refineries",
    },
    Listing {
        symbol: "TCS",
        name: "Tata Consultancy Services Limited",
        base_price: 4200.0,
        volatility: 0.015,
        volume_range: (2_000_000, 8_000_000),
        market_cap: 15.4e12,
        sector: "Information Technology",
        industry: "IT Services",
    },
    Listing {
        symbol: "HDFCBANK",
        name: "HDFC Bank Limited",
        base_price: 1750.0,
        volatility: 0.018,
        volume_range: (3_000_000, 12_000_000),
        market_cap: 13.2e12,
        sector: "Financial Services",
        industry: "Private Sector Bank",
    },
    Listing {
        symbol: "INFY",
        name: "Infosys Limited",
        base_price: 1850.0,
        volatility: 0.02,
        volume_range: (4_000_000, 10_000_000),
        market_cap: 7.8e12,
        sector: "Information Technology",
        industry: "IT Services",
    },
    Listing {
        symbol: "ICICIBANK",
        name: "ICICI Bank Limited",
        base_price: 1250.0,
        volatility: 0.022,
        volume_range: (8_000_000, 20_000_000),
        market_cap: 8.7e12,
        sector: "Financial Services",
        industry: "Private Sector Bank",
    },
    Listing {
        symbol: "BHARTIARTL",
        name: "Bharti Airtel Limited",
        base_price: 1650.0,
        volatility: 0.025,
        volume_range: (6_000_000, 18_000_000),
        market_cap: 9.2e12,
        sector: "Telecommunication",
        industry: "Telecom Services",
    },
    Listing {
        symbol: "ITC",
        name: "ITC Limited",
        base_price: 485.0,
        volatility: 0.015,
        volume_range: (10_000_000, 25_000_000),
        market_cap: 6.0e12,
        sector: "FMCG",
        industry: "Diversified FMCG",
    },
    Listing {
        symbol: "SBIN",
        name: "State Bank of India",
        base_price: 850.0,
        volatility: 0.025,
        volume_range: (15_000_000, 35_000_000),
        market_cap: 7.6e12,
        sector: "Financial Services",
        industry: "Public Sector Bank",
    },
    Listing {
        symbol: "LT",
        name: "Larsen & Toubro Limited",
        base_price: 3650.0,
        volatility: 0.02,
        volume_range: (1_500_000, 5_000_000),
        market_cap: 5.1e12,
        sector: "Construction",
        industry: "Engineering & Construction",
    },
    Listing {
        symbol: "HCLTECH",
        name: "HCL Technologies Limited",
        base_price: 1580.0,
        volatility: 0.022,
        volume_range: (2_500_000, 7_000_000),
        market_cap: 4.3e12,
        sector: "Information Technology",
        industry: "IT Services",
    },
];

const GENERIC_SECTORS: [&str; 5] = ["Technology", "Finance", "Healthcare", "Energy", "Consumer Goods"];

/// Per-symbol parameters, from the listing table or derived from the symbol itself.
struct Profile {
    name: Cow<'static, str>,
    base_price: f64,
    volatility: f64,
    volume_range: (u64, u64),
    market_cap: f64,
    sector: &'static str,
    industry: &'static str,
}

impl Profile {
    fn for_symbol(symbol: &Symbol) -> Self {
        if let Some(listing) = LISTINGS.iter().find(|l| l.symbol == symbol.as_str()) {
            return Self {
                name: Cow::Borrowed(listing.name),
                base_price: listing.base_price,
                volatility: listing.volatility,
                volume_range: listing.volume_range,
                market_cap: listing.market_cap,
                sector: listing.sector,
                industry: listing.industry,
            };
        }

        // stable across hours so an unknown symbol keeps one identity
        let mut rng = fastrand::Rng::with_seed(symbol_seed(symbol));
        Self {
            name: Cow::Owned(format!("{symbol} Limited")),
            base_price: round2(100.0 + rng.f64() * 4_900.0),
            volatility: 0.015 + rng.f64() * 0.015,
            volume_range: (1_000_000, 10_000_000),
            market_cap: 1e11 + rng.f64() * (1e13 - 1e11),
            sector: GENERIC_SECTORS[rng.usize(..GENERIC_SECTORS.len())],
            industry: "Diversified",
        }
    }

    fn floor(&self) -> f64 {
        self.base_price * (1.0 - MAX_DRIFT)
    }

    fn ceiling(&self) -> f64 {
        self.base_price * (1.0 + MAX_DRIFT)
    }

    fn daily_move(&self, rng: &mut fastrand::Rng) -> f64 {
        (standard_normal(rng) * self.volatility).clamp(-MAX_DAILY_MOVE, MAX_DAILY_MOVE)
    }
}

/// Terminal fallback provider. Never fails.
#[derive(Debug, Clone, Default)]
pub struct SyntheticProvider {
    config: SyntheticConfig,
}

impl SyntheticProvider {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Generates the payload for `kind` as of `at`; the same hour yields the same numbers.
    pub fn generate(&self, kind: DataKind, symbol: &Symbol, at: UtcDateTime) -> Payload {
        let profile = Profile::for_symbol(symbol);
        let mut rng = fastrand::Rng::with_seed(hour_seed(symbol, kind, at.hour_bucket()));

        let data = match kind {
            DataKind::Quote => PayloadData::Quote(self.quote(symbol, &profile, &mut rng, at)),
            DataKind::Historical => {
                PayloadData::Historical(self.history(symbol, &profile, &mut rng, at))
            }
            DataKind::Profile => PayloadData::Profile(self.profile(symbol, &profile, &mut rng)),
        };
        Payload::synthetic(ProviderId::Synthetic, data)
    }

    fn quote(
        &self,
        symbol: &Symbol,
        profile: &Profile,
        rng: &mut fastrand::Rng,
        at: UtcDateTime,
    ) -> Quote {
        let moved = profile.base_price * (1.0 + profile.daily_move(rng));
        let price = round2(moved.clamp(profile.floor(), profile.ceiling()));
        let (low, high) = profile.volume_range;
        let volume = rng.u64(low..=high);

        let quote = Quote::new(
            symbol.clone(),
            price,
            profile.base_price,
            Some(volume),
            &self.config.currency,
            at,
        )
        .unwrap_or_else(|_| fallback_quote(symbol, price, profile.base_price, volume, at));
        quote.with_exchange(self.config.exchange.clone())
    }

    fn history(
        &self,
        symbol: &Symbol,
        profile: &Profile,
        rng: &mut fastrand::Rng,
        at: UtcDateTime,
    ) -> PriceHistory {
        let days = self.config.history_days.clamp(1, MAX_HISTORY_DAYS);
        let today = at.date();
        let intraday = profile.volatility * 0.5;
        let mut current = profile.base_price;
        let mut bars = Vec::with_capacity(days);

        for offset in (1..=days as i64).rev() {
            let Some(date) = today.checked_sub(Duration::days(offset)) else {
                continue;
            };

            let daily_move = profile.daily_move(rng);
            let open = current;
            let close = (open * (1.0 + daily_move)).clamp(profile.floor(), profile.ceiling());
            let high = (open.max(close) * (1.0 + standard_normal(rng).abs() * intraday))
                .min(profile.ceiling());
            let low = (open.min(close) * (1.0 - standard_normal(rng).abs() * intraday))
                .max(profile.floor());
            let volume = (rng.u64(1_000_000..=5_000_000) as f64 * (1.0 + daily_move.abs() * 10.0))
                as u64;

            if let Ok(bar) = Bar::new(
                date,
                round2(open),
                round2(high),
                round2(low),
                round2(close),
                Some(volume),
            ) {
                bars.push(bar);
            }
            current = close;
        }

        PriceHistory::new(symbol.clone(), bars)
    }

    fn profile(&self, symbol: &Symbol, profile: &Profile, rng: &mut fastrand::Rng) -> CompanyProfile {
        let mut company = CompanyProfile::new(symbol.clone(), profile.name.clone());
        company.description = Some(format!(
            "{} operates in the {} sector.",
            profile.name,
            profile.sector.to_ascii_lowercase()
        ));
        company.sector = Some(profile.sector.to_owned());
        company.industry = Some(profile.industry.to_owned());
        company.market_cap = Some(profile.market_cap);
        company.employees = Some(rng.u64(50_000..=500_000));
        company.website = Some(format!(
            "https://www.{}.com",
            symbol.as_str().to_ascii_lowercase()
        ));
        company.currency = Some(self.config.currency.clone());
        company.exchange = Some(self.config.exchange.clone());
        company
    }
}

impl Provider for SyntheticProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Synthetic
    }

    fn supports(&self, _kind: DataKind) -> bool {
        true
    }

    fn fetch<'a>(&'a self, kind: DataKind, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move { Ok(self.generate(kind, symbol, UtcDateTime::now())) })
    }
}

/// Used only when the configured currency fails validation.
fn fallback_quote(symbol: &Symbol, price: f64, previous_close: f64, volume: u64, at: UtcDateTime) -> Quote {
    let change = price - previous_close;
    Quote {
        symbol: symbol.clone(),
        price,
        change,
        percent_change: change / previous_close * 100.0,
        previous_close,
        volume: Some(volume),
        currency: String::from("INR"),
        exchange: None,
        as_of: at,
    }
}

/// FNV-1a over the symbol bytes; stable across builds, unlike `DefaultHasher`.
fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

fn hour_seed(symbol: &Symbol, kind: DataKind, hour: u64) -> u64 {
    let salt = match kind {
        DataKind::Quote => 0x51,
        DataKind::Historical => 0x48,
        DataKind::Profile => 0x50,
    };
    symbol_seed(symbol) ^ hour.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ salt
}

/// Irwin-Hall approximation of N(0, 1).
fn standard_normal(rng: &mut fastrand::Rng) -> f64 {
    (0..12).map(|_| rng.f64()).sum::<f64>() - 6.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(input: &str) -> Symbol {
        Symbol::parse(input).expect("valid symbol")
    }

    fn at(unix: i64) -> UtcDateTime {
        UtcDateTime::from_unix_seconds(unix).expect("valid timestamp")
    }

    #[test]
    fn quotes_are_stable_within_an_hour_and_bounded() {
        let provider = SyntheticProvider::default();
        let first = provider.generate(DataKind::Quote, &symbol("RELIANCE"), at(1_704_186_000));
        let second = provider.generate(DataKind::Quote, &symbol("RELIANCE"), at(1_704_186_000 + 1_200));

        let first_quote = first.as_quote().expect("quote");
        let second_quote = second.as_quote().expect("quote");
        assert!(first.is_synthetic);
        assert_eq!(first.provider, ProviderId::Synthetic);
        assert_eq!(first_quote.price, second_quote.price);
        assert_eq!(first_quote.previous_close, 2950.0);
        assert!(first_quote.price >= 2950.0 * 0.95 && first_quote.price <= 2950.0 * 1.05);
        assert_eq!(first_quote.exchange.as_deref(), Some("NSE"));
    }

    #[test]
    fn unknown_symbols_get_a_stable_base_price() {
        let provider = SyntheticProvider::default();
        for hour in 0..24 {
            let payload = provider.generate(DataKind::Quote, &symbol("ZZTOP"), at(hour * 3_600));
            let quote = payload.as_quote().expect("quote");
            assert!((quote.price - quote.previous_close).abs() <= quote.previous_close * 0.05 + 0.01);
            assert!(quote.previous_close >= 100.0 && quote.previous_close <= 5_000.0);
        }
    }

    #[test]
    fn history_has_configured_length_and_stays_in_band() {
        let provider = SyntheticProvider::new(SyntheticConfig {
            history_days: 45,
            ..SyntheticConfig::default()
        });
        let payload = provider.generate(DataKind::Historical, &symbol("TCS"), at(1_704_186_000));
        let history = payload.as_history().expect("history");

        assert_eq!(history.bars.len(), 45);
        for window in history.bars.windows(2) {
            assert!(window[0].date < window[1].date);
            let daily = (window[1].close - window[0].close).abs() / window[0].close;
            assert!(daily <= 0.0501, "daily move {daily}");
        }
        for bar in &history.bars {
            assert!(bar.low >= 4200.0 * 0.8 - 0.01 && bar.high <= 4200.0 * 1.2 + 0.01);
        }
        assert!(history.bars.last().expect("bars").date < at(1_704_186_000).date());
    }

    #[test]
    fn oversized_history_is_capped() {
        let provider = SyntheticProvider::new(SyntheticConfig {
            history_days: usize::MAX,
            ..SyntheticConfig::default()
        });
        let payload = provider.generate(DataKind::Historical, &symbol("TCS"), at(1_704_186_000));

        assert_eq!(payload.as_history().expect("history").bars.len(), MAX_HISTORY_DAYS);
    }

    #[tokio::test]
    async fn fetch_never_fails() {
        let provider = SyntheticProvider::default();
        for kind in DataKind::ALL {
            let payload = provider
                .fetch(kind, &symbol("SBIN"))
                .await
                .expect("synthetic provider never fails");
            assert_eq!(payload.kind(), kind);
            assert!(payload.is_synthetic);
        }
    }

    #[test]
    fn profile_uses_listing_table() {
        let payload = SyntheticProvider::default().generate(DataKind::Profile, &symbol("INFY"), at(0));
        let profile = payload.as_profile().expect("profile");
        assert_eq!(profile.name, "Infosys Limited");
        assert_eq!(profile.website.as_deref(), Some("https://www.infy.com"));
        assert_eq!(profile.currency.as_deref(), Some("INR"));
    }
}
