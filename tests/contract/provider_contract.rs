//! Contract every provider honors: typed payloads tagged with the provider's
//! id, and upstream failures classified into the shared error taxonomy.

#[path = "../support/mod.rs"]
mod support;

use std::collections::HashMap;
use std::sync::Arc;

use ferroquote_core::{
    DataKind, FetchErrorKind, FinnhubAdapter, HttpError, HttpResponse, Provider, ProviderId,
    ProviderMode, ProviderRouterBuilder, ServiceConfig, SyntheticProvider, TwelveDataAdapter,
};

use support::{symbol, RecordingHttpClient};

const TD_QUOTE: &str = r#"{"symbol":"TCS","exchange":"NSE","currency":"INR","timestamp":1704186000,
    "close":"3800.10","previous_close":"3750.00","volume":"250000"}"#;
const TD_SERIES: &str = r#"{"status":"ok","values":[
    {"datetime":"2024-01-03","open":"3790","high":"3820","low":"3770","close":"3800","volume":"1000"},
    {"datetime":"2024-01-02","open":"3760","high":"3795","low":"3740","close":"3790","volume":"1100"}]}"#;
const TD_PROFILE: &str = r#"{"symbol":"TCS","name":"Tata Consultancy Services","exchange":"NSE",
    "sector":"Technology","industry":"IT Services","employees":600000,"website":"https://www.tcs.com"}"#;

const FH_QUOTE: &str = r#"{"c":3800.1,"pc":3750.0,"t":1704186000}"#;
const FH_CANDLES: &str = r#"{"s":"ok","t":[1704153600,1704240000],"o":[3760,3790],"h":[3795,3820],
    "l":[3740,3770],"c":[3790,3800],"v":[1100,1000]}"#;
const FH_PROFILE: &str = r#"{"name":"Tata Consultancy Services","currency":"INR","exchange":"NSE",
    "finnhubIndustry":"Technology","marketCapitalization":13900000,"weburl":"https://www.tcs.com"}"#;

struct UpstreamCase {
    id: ProviderId,
    build: fn(Arc<RecordingHttpClient>) -> Arc<dyn Provider>,
    quote: &'static str,
    history: &'static str,
    profile: &'static str,
}

fn upstream_cases() -> Vec<UpstreamCase> {
    vec![
        UpstreamCase {
            id: ProviderId::TwelveData,
            build: |client| Arc::new(TwelveDataAdapter::with_base_url(client, "td-key", "https://td.test")),
            quote: TD_QUOTE,
            history: TD_SERIES,
            profile: TD_PROFILE,
        },
        UpstreamCase {
            id: ProviderId::Finnhub,
            build: |client| Arc::new(FinnhubAdapter::with_base_url(client, "fh-key", "https://fh.test")),
            quote: FH_QUOTE,
            history: FH_CANDLES,
            profile: FH_PROFILE,
        },
    ]
}

// =============================================================================
// Contract: payload shape
// =============================================================================

#[tokio::test]
async fn every_upstream_returns_tagged_quote_history_and_profile() {
    for case in upstream_cases() {
        for (kind, body) in [
            (DataKind::Quote, case.quote),
            (DataKind::Historical, case.history),
            (DataKind::Profile, case.profile),
        ] {
            let client = RecordingHttpClient::json(body);
            let provider = (case.build)(client.clone());
            assert_eq!(provider.id(), case.id);
            assert!(provider.supports(kind), "provider '{}' supports {kind}", case.id);

            let payload = provider
                .fetch(kind, &symbol("TCS"))
                .await
                .unwrap_or_else(|error| panic!("provider '{}' {kind} failed: {error}", case.id));

            assert_eq!(payload.provider, case.id, "provider '{}': tag", case.id);
            assert!(!payload.is_synthetic, "provider '{}': not synthetic", case.id);
            assert_eq!(payload.kind(), kind, "provider '{}': kind", case.id);
            assert_eq!(payload.symbol().as_str(), "TCS", "provider '{}': symbol", case.id);
            assert_eq!(client.recorded_urls().len(), 1, "provider '{}': one request", case.id);
        }
    }
}

#[tokio::test]
async fn upstream_values_are_normalized() {
    for case in upstream_cases() {
        let provider = (case.build)(RecordingHttpClient::json(case.quote));
        let payload = provider.fetch(DataKind::Quote, &symbol("TCS")).await.expect("quote");
        let quote = payload.as_quote().expect("quote payload");
        assert_eq!(quote.price, 3800.1, "provider '{}': price", case.id);
        assert_eq!(quote.previous_close, 3750.0, "provider '{}': previous close", case.id);
        assert_eq!(quote.currency, "INR", "provider '{}': currency", case.id);

        let provider = (case.build)(RecordingHttpClient::json(case.history));
        let payload = provider
            .fetch(DataKind::Historical, &symbol("TCS"))
            .await
            .expect("history");
        let history = payload.as_history().expect("history payload");
        assert_eq!(history.bars.len(), 2, "provider '{}': bar count", case.id);
        assert!(
            history.bars[0].date < history.bars[1].date,
            "provider '{}': bars ascending",
            case.id
        );

        let provider = (case.build)(RecordingHttpClient::json(case.profile));
        let payload = provider
            .fetch(DataKind::Profile, &symbol("TCS"))
            .await
            .expect("profile");
        let profile = payload.as_profile().expect("profile payload");
        assert_eq!(profile.name, "Tata Consultancy Services");
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
    }
}

#[tokio::test]
async fn finnhub_market_cap_is_scaled_from_millions() {
    let provider = FinnhubAdapter::with_base_url(RecordingHttpClient::json(FH_PROFILE), "fh-key", "https://fh.test");
    let payload = provider
        .fetch(DataKind::Profile, &symbol("TCS"))
        .await
        .expect("profile");
    assert_eq!(
        payload.as_profile().and_then(|profile| profile.market_cap),
        Some(13_900_000_000_000.0)
    );
}

// =============================================================================
// Contract: error classification
// =============================================================================

#[tokio::test]
async fn http_failures_map_to_the_same_kinds_for_every_upstream() {
    let expectations = [
        (429, FetchErrorKind::RateLimited),
        (401, FetchErrorKind::Unauthorized),
        (403, FetchErrorKind::Unauthorized),
        (404, FetchErrorKind::NotFound),
        (408, FetchErrorKind::Transient),
        (503, FetchErrorKind::Transient),
        (418, FetchErrorKind::Unknown),
    ];

    for case in upstream_cases() {
        for (status, expected) in expectations {
            let client = RecordingHttpClient::new([Ok(HttpResponse::with_status(status, "upstream said no"))]);
            let provider = (case.build)(client);
            let error = provider
                .fetch(DataKind::Quote, &symbol("TCS"))
                .await
                .expect_err("non-2xx must fail");
            assert_eq!(error.kind(), expected, "provider '{}': status {status}", case.id);
            assert_eq!(error.provider(), case.id);
        }

        let client = RecordingHttpClient::new([Err(HttpError::new("connection reset by peer"))]);
        let error = (case.build)(client)
            .fetch(DataKind::Quote, &symbol("TCS"))
            .await
            .expect_err("transport failure");
        assert_eq!(error.kind(), FetchErrorKind::Transient, "provider '{}': transport", case.id);

        let error = (case.build)(RecordingHttpClient::json("not json at all"))
            .fetch(DataKind::Profile, &symbol("TCS"))
            .await
            .expect_err("malformed body");
        assert_eq!(error.kind(), FetchErrorKind::Unknown, "provider '{}': malformed", case.id);
    }
}

#[tokio::test]
async fn empty_upstream_results_are_not_found() {
    let twelvedata = TwelveDataAdapter::with_base_url(
        RecordingHttpClient::json(r#"{"status":"ok","values":[]}"#),
        "td-key",
        "https://td.test",
    );
    let error = twelvedata
        .fetch(DataKind::Historical, &symbol("NOPE"))
        .await
        .expect_err("empty series");
    assert_eq!(error.kind(), FetchErrorKind::NotFound);

    let finnhub = FinnhubAdapter::with_base_url(
        RecordingHttpClient::json(r#"{"c":0,"d":null,"dp":null,"h":0,"l":0,"o":0,"pc":0,"t":0}"#),
        "fh-key",
        "https://fh.test",
    );
    let error = finnhub
        .fetch(DataKind::Quote, &symbol("NOPE"))
        .await
        .expect_err("zero quote");
    assert_eq!(error.kind(), FetchErrorKind::NotFound);

    let finnhub = FinnhubAdapter::with_base_url(
        RecordingHttpClient::json(r#"{"s":"no_data"}"#),
        "fh-key",
        "https://fh.test",
    );
    let error = finnhub
        .fetch(DataKind::Historical, &symbol("NOPE"))
        .await
        .expect_err("no candles");
    assert_eq!(error.kind(), FetchErrorKind::NotFound);
}

#[tokio::test]
async fn exhausted_local_quota_is_rate_limited_without_a_request() {
    let client = RecordingHttpClient::new([
        Ok(HttpResponse::ok_json(FH_QUOTE)),
        Ok(HttpResponse::ok_json(FH_QUOTE)),
    ]);
    let provider = FinnhubAdapter::with_base_url(client.clone(), "fh-key", "https://fh.test")
        .with_quota_per_minute(1);

    provider
        .fetch(DataKind::Quote, &symbol("TCS"))
        .await
        .expect("first call is within quota");
    let error = provider
        .fetch(DataKind::Quote, &symbol("TCS"))
        .await
        .expect_err("second call exceeds quota");

    assert_eq!(error.kind(), FetchErrorKind::RateLimited);
    assert_eq!(client.recorded_urls().len(), 1);
}

// =============================================================================
// Contract: synthetic provider
// =============================================================================

#[tokio::test]
async fn synthetic_provider_never_fails_and_tags_its_output() {
    let provider = SyntheticProvider::default();
    assert_eq!(provider.id(), ProviderId::Synthetic);

    for raw in ["RELIANCE", "TCS", "ZZUNLISTED"] {
        for kind in DataKind::ALL {
            assert!(provider.supports(kind));
            let payload = provider
                .fetch(kind, &symbol(raw))
                .await
                .expect("synthetic provider never fails");
            assert!(payload.is_synthetic, "{raw} {kind}: synthetic flag");
            assert_eq!(payload.provider, ProviderId::Synthetic);
            assert_eq!(payload.kind(), kind);
        }
    }
}

#[tokio::test]
async fn synthetic_history_has_configured_length_and_valid_bars() {
    let provider = SyntheticProvider::default();
    let payload = provider
        .fetch(DataKind::Historical, &symbol("INFY"))
        .await
        .expect("history");
    let history = payload.as_history().expect("history payload");

    assert_eq!(history.bars.len(), provider.config().history_days);
    for window in history.bars.windows(2) {
        assert!(window[0].date < window[1].date);
    }
    for bar in &history.bars {
        assert!(bar.low <= bar.open && bar.open <= bar.high);
        assert!(bar.low <= bar.close && bar.close <= bar.high);
        assert!(bar.low > 0.0);
    }
}

// =============================================================================
// Contract: configured wiring
// =============================================================================

fn config_from(pairs: &[(&str, &str)]) -> ServiceConfig {
    let vars = pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect::<HashMap<_, _>>();
    ServiceConfig::from_lookup(|name| vars.get(name).cloned()).expect("valid configuration")
}

#[tokio::test]
async fn environment_settings_reach_the_upstream_requests() {
    // Given: a configuration naming keys, endpoints, timeouts, quota, exchange and history length
    let mut config = config_from(&[
        ("TWELVEDATA_API_KEY", "td-key"),
        ("FERROQUOTE_FINNHUB_API_KEY", "fh-key"),
        ("FERROQUOTE_TWELVEDATA_BASE_URL", "https://td.test/"),
        ("FERROQUOTE_FINNHUB_BASE_URL", "https://fh.test"),
        ("FERROQUOTE_UPSTREAM_TIMEOUT_MS", "2500"),
        ("FERROQUOTE_HISTORY_DAYS", "5"),
    ]);
    config.twelvedata.quota_per_minute = 2;
    config.synthetic.exchange = String::from("BSE");

    let client = RecordingHttpClient::new([
        Ok(HttpResponse::ok_json(TD_QUOTE)),
        Ok(HttpResponse::ok_json(TD_SERIES)),
        Ok(HttpResponse::ok_json(FH_QUOTE)),
    ]);
    let router = ProviderRouterBuilder::from_config(&config)
        .with_http_client(client.clone())
        .build();

    // When: each upstream is called through the router
    let primary = router.providers_for(ProviderMode::PrimaryOnly, DataKind::Quote);
    let twelvedata = primary.first().expect("primary configured");
    twelvedata
        .fetch(DataKind::Quote, &symbol("TCS"))
        .await
        .expect("quote");
    twelvedata
        .fetch(DataKind::Historical, &symbol("TCS"))
        .await
        .expect("history");
    let limited = twelvedata
        .fetch(DataKind::Profile, &symbol("TCS"))
        .await
        .expect_err("third call exceeds the quota of two");

    let secondary = router.providers_for(ProviderMode::SecondaryOnly, DataKind::Quote);
    secondary
        .first()
        .expect("secondary configured")
        .fetch(DataKind::Quote, &symbol("TCS"))
        .await
        .expect("quote");

    // Then: the requests carry the configured endpoints, credentials and settings
    assert_eq!(limited.kind(), FetchErrorKind::RateLimited);
    assert_eq!(
        client.recorded_urls(),
        [
            "https://td.test/quote?apikey=td-key&exchange=BSE&symbol=TCS",
            "https://td.test/time_series?apikey=td-key&exchange=BSE&interval=1day&outputsize=5&symbol=TCS",
            "https://fh.test/quote?symbol=TCS.BO&token=fh-key",
        ]
    );
    assert!(client
        .recorded()
        .iter()
        .all(|request| request.timeout_ms == 2_500));
}
