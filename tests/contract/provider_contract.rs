use std::sync::Arc;

use gameinsights_core::{
    DataSource, FetchRequest, GamalyticAdapter, HowLongToBeatAdapter, HttpClient,
    HttpError, HttpResponse, LookupKind, ProtonDbAdapter, SourceErrorKind, SourceId,
    StaticHttpClient, SteamAchievementsAdapter, SteamChartsAdapter, SteamReviewAdapter,
    SteamSpyAdapter, SteamStoreAdapter,
};
use gameinsights_tests::app_id;

fn adapters(client: Arc<dyn HttpClient>) -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(SteamStoreAdapter::new(Arc::clone(&client), "us", "english")),
        Arc::new(GamalyticAdapter::new(Arc::clone(&client), None)),
        Arc::new(SteamSpyAdapter::new(Arc::clone(&client))),
        Arc::new(SteamChartsAdapter::new(Arc::clone(&client))),
        Arc::new(SteamReviewAdapter::new(Arc::clone(&client))),
        Arc::new(SteamAchievementsAdapter::new(
            Arc::clone(&client),
            Some(String::from("test-key")),
            "english",
        )),
        Arc::new(ProtonDbAdapter::new(Arc::clone(&client))),
        Arc::new(HowLongToBeatAdapter::new(client)),
    ]
}

fn request() -> FetchRequest {
    FetchRequest::new(app_id("570")).with_name("Dota 2")
}

async fn kinds_for(client: StaticHttpClient) -> Vec<(SourceId, SourceErrorKind)> {
    let client: Arc<dyn HttpClient> = Arc::new(client);
    let mut kinds = Vec::new();
    for adapter in adapters(client) {
        let outcome = adapter.fetch(&request()).await;

        assert_eq!(outcome.source(), adapter.id(), "adapter '{}': source", adapter.id());
        assert_eq!(outcome.identifier().as_str(), "570", "adapter '{}': identifier", adapter.id());
        assert!(!outcome.ok(), "adapter '{}': unexpected success", adapter.id());
        let error = outcome.error().expect("failed outcome carries an error");
        assert!(!error.message().is_empty(), "adapter '{}': empty message", adapter.id());
        kinds.push((adapter.id(), error.kind()));
    }
    kinds
}

#[test]
fn adapters_cover_every_source_once() {
    let client: Arc<dyn HttpClient> = Arc::new(StaticHttpClient::new());
    let ids = adapters(client)
        .iter()
        .map(|adapter| adapter.id())
        .collect::<Vec<_>>();

    assert_eq!(ids, SourceId::ALL);
    for adapter in adapters(Arc::new(StaticHttpClient::new())) {
        assert_eq!(adapter.lookup(), adapter.id().lookup());
        let policy = adapter.policy();
        assert_eq!(policy.source, adapter.id());
        assert!(policy.quota_limit > 0, "adapter '{}': quota", adapter.id());
    }
}

#[tokio::test]
async fn missing_resource_maps_to_not_found() {
    // Unrouted requests answer 404.
    let kinds = kinds_for(StaticHttpClient::new()).await;

    for (source, kind) in kinds {
        assert_eq!(kind, SourceErrorKind::NotFound, "adapter '{source}'");
    }
}

#[tokio::test]
async fn throttled_provider_maps_to_rate_limited() {
    let kinds = kinds_for(StaticHttpClient::new().route("", HttpResponse::with_status(429, ""))).await;

    for (source, kind) in kinds {
        assert_eq!(kind, SourceErrorKind::RateLimited, "adapter '{source}'");
    }
}

#[tokio::test]
async fn rejected_credentials_map_to_auth_error() {
    let kinds = kinds_for(StaticHttpClient::new().route("", HttpResponse::with_status(403, ""))).await;

    for (source, kind) in kinds {
        assert_eq!(kind, SourceErrorKind::AuthError, "adapter '{source}'");
    }
}

#[tokio::test(start_paused = true)]
async fn transport_timeouts_map_to_timeout_after_retries() {
    let kinds = kinds_for(
        StaticHttpClient::new().route_error("", HttpError::timeout("deadline exceeded")),
    )
    .await;

    for (source, kind) in kinds {
        assert_eq!(kind, SourceErrorKind::Timeout, "adapter '{source}'");
    }
}

#[tokio::test]
async fn missing_required_key_fails_before_any_request() {
    let client = Arc::new(StaticHttpClient::new());
    let adapter =
        SteamAchievementsAdapter::new(client.clone(), None, "english");

    let validation = adapter.validate_config().expect_err("key required");
    let outcome = adapter.fetch(&request()).await;

    assert_eq!(validation.kind(), SourceErrorKind::ConfigError);
    assert_eq!(outcome.error().map(|e| e.kind()), Some(SourceErrorKind::ConfigError));
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn name_based_adapter_without_name_makes_no_request() {
    let client = Arc::new(StaticHttpClient::new());
    let adapter = HowLongToBeatAdapter::new(client.clone());
    assert_eq!(adapter.lookup(), LookupKind::Name);

    let outcome = adapter
        .fetch(&FetchRequest::new(app_id("570")))
        .await;

    assert_eq!(outcome.error().map(|e| e.kind()), Some(SourceErrorKind::NotFound));
    assert_eq!(client.request_count(), 0);
}
