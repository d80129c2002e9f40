//! Behavior tests for error classification, retry eligibility and how
//! failures surface to callers.

mod support;

use ferroquote_core::{
    DataKind, FetchErrorKind, ProviderId, ProviderMode, ServiceError, ValidationError,
};

use support::{test_config, Providers, ScriptedProvider, Step};

// =============================================================================
// Errors: retry eligibility
// =============================================================================

#[tokio::test(start_paused = true)]
async fn only_transient_primary_failures_are_retried() {
    for kind in [
        FetchErrorKind::Unauthorized,
        FetchErrorKind::RateLimited,
        FetchErrorKind::NotFound,
        FetchErrorKind::Unknown,
    ] {
        // Given: a primary that fails with a non-transient error
        let providers = Providers::new(
            ScriptedProvider::failing(ProviderId::TwelveData, kind),
            ScriptedProvider::succeeding(ProviderId::Finnhub),
        );
        let service = providers.service(&test_config(ProviderMode::Auto));

        // When: a quote is requested
        let payload = service.get_quote("BHARTIARTL").await.expect("secondary");

        // Then: the primary was called once and the secondary answered
        assert_eq!(providers.primary().calls(), 1, "{kind}: primary calls");
        assert_eq!(payload.provider, ProviderId::Finnhub, "{kind}: answered by");
    }
}

#[tokio::test(start_paused = true)]
async fn a_retry_that_hits_a_permanent_error_stops_retrying() {
    let providers = Providers::new(
        ScriptedProvider::failing(ProviderId::TwelveData, FetchErrorKind::NotFound)
            .with_script([Step::Fail(FetchErrorKind::Transient)]),
        ScriptedProvider::succeeding(ProviderId::Finnhub),
    );
    let mut config = test_config(ProviderMode::PrimaryOnly);
    config.retry.max_retries = 5;
    let service = providers.service(&config);

    let error = service.get_quote("GRASIM").await.expect_err("not found");

    assert_eq!(error.code(), "fetch.not_found");
    assert_eq!(providers.primary().calls(), 2);
}

// =============================================================================
// Errors: request validation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn invalid_symbols_are_rejected_before_any_provider_is_called() {
    let providers = Providers::all_succeeding();
    let service = providers.service(&test_config(ProviderMode::Auto));

    for raw in ["", "   ", "1TCS", "TC$S", "ABCDEFGHIJKLMNOPQRSTUVWXYZ"] {
        let error = service.get_quote(raw).await.expect_err("invalid symbol");
        assert!(
            matches!(error, ServiceError::Validation(_)),
            "'{raw}' should be a validation error, got {error:?}"
        );
        assert_eq!(error.code(), "service.invalid_request");
    }

    assert_eq!(service.get_quote("").await, Err(ServiceError::Validation(ValidationError::EmptySymbol)));
    assert_eq!(providers.primary().calls(), 0);
    assert_eq!(providers.synthetic.calls(), 0);
    assert_eq!(service.status().cache.misses, 0);
}

#[tokio::test(start_paused = true)]
async fn invalidating_an_invalid_symbol_is_a_validation_error() {
    let providers = Providers::all_succeeding();
    let service = providers.service(&test_config(ProviderMode::Auto));

    assert!(matches!(service.invalidate("!!"), Err(ServiceError::Validation(_))));
}

// =============================================================================
// Errors: missing configuration
// =============================================================================

#[tokio::test(start_paused = true)]
async fn restricted_mode_without_its_provider_reports_unauthorized() {
    // Given: no primary configured
    let providers = Providers {
        primary: None,
        ..Providers::all_succeeding()
    };
    let service = providers.service(&test_config(ProviderMode::PrimaryOnly));

    // When: data is requested in primary-only mode
    let error = service
        .get_data(DataKind::Historical, "TCS")
        .await
        .expect_err("primary is not configured");

    // Then: the caller learns the primary needs credentials
    match error {
        ServiceError::Fetch(error) => {
            assert_eq!(error.kind(), FetchErrorKind::Unauthorized);
            assert_eq!(error.provider(), ProviderId::TwelveData);
            assert!(error.message().contains("not configured"));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
    assert_eq!(providers.synthetic.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn secondary_only_without_a_secondary_names_the_secondary() {
    let providers = Providers {
        secondary: None,
        ..Providers::all_succeeding()
    };
    let service = providers.service(&test_config(ProviderMode::SecondaryOnly));

    let error = service.get_quote("TCS").await.expect_err("not configured");

    assert_eq!(error.code(), "fetch.unauthorized");
    match error {
        ServiceError::Fetch(error) => assert_eq!(error.provider(), ProviderId::Finnhub),
        other => panic!("expected fetch error, got {other:?}"),
    }
}

// =============================================================================
// Errors: batches
// =============================================================================

#[tokio::test(start_paused = true)]
async fn a_batch_reports_per_symbol_failures_without_failing_the_rest() {
    let providers = Providers::new(
        ScriptedProvider::succeeding(ProviderId::TwelveData),
        ScriptedProvider::succeeding(ProviderId::Finnhub),
    );
    let service = providers.service(&test_config(ProviderMode::PrimaryOnly));

    let batch = service.get_quotes(&["TCS", "9BAD", "INFY"]).await;

    assert_eq!(batch.requested, 3);
    assert_eq!(batch.succeeded, 2);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.errors[0].symbol, "9BAD");
    assert_eq!(batch.errors[0].code, "service.invalid_request");

    let symbols = batch
        .quotes
        .iter()
        .map(|payload| payload.symbol().as_str().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(symbols, ["TCS", "INFY"]);
}

#[tokio::test(start_paused = true)]
async fn a_batch_carries_upstream_error_codes() {
    let providers = Providers::new(
        ScriptedProvider::failing(ProviderId::TwelveData, FetchErrorKind::RateLimited),
        ScriptedProvider::succeeding(ProviderId::Finnhub),
    );
    let service = providers.service(&test_config(ProviderMode::PrimaryOnly));

    let batch = service.get_quotes(&["TCS", "INFY"]).await;

    assert_eq!(batch.failed, 2);
    assert!(batch
        .errors
        .iter()
        .all(|error| error.code == "fetch.rate_limited"));
    assert_eq!(batch.errors[1].symbol, "INFY");
}
