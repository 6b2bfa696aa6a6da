use std::sync::{Arc, Mutex};
use std::time::Duration;

use gameinsights_core::{
    AppId, BatchEntry, BatchSummary, CancelSignal, CollectRequest, Collector, CollectorConfig,
    FetchObserver, FetchOutcome, Field, FieldValue, GovernorScope, RateGovernor, RateLimit,
    SourceError, SourceErrorKind, SourceId, SourceSelection, StaticSource, UtcDateTime,
    DEFAULT_RECAP_KEYS,
};
use serde_json::json;

fn clock() -> UtcDateTime {
    gameinsights_tests::clock_at("2024-06-01T00:00:00Z")
}

fn request(ids: &[&str]) -> CollectRequest {
    CollectRequest::parse(ids).expect("valid identifiers")
}

fn dota_store() -> StaticSource {
    StaticSource::new(SourceId::SteamStore).respond(
        "570",
        json!({
            "name": "Dota 2",
            "final": 0,
            "type": "game",
            "is_free": true,
            "developers": ["Valve"],
            "publishers": ["Valve"],
            "release_date": "Jul 9, 2013",
            "categories": ["Multi-player", "Steam Trading Cards"]
        }),
    )
}

fn dota_spy() -> StaticSource {
    StaticSource::new(SourceId::SteamSpy).respond(
        "570",
        json!({ "name": "Dota 2 (spy)", "price": 0, "ccu": 500000, "tags": ["MOBA", "Free to Play"] }),
    )
}

#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<(SourceId, String)>>,
    completed: Mutex<Vec<(SourceId, bool)>>,
    batches: Mutex<Vec<BatchSummary>>,
}

impl FetchObserver for RecordingObserver {
    fn on_fetch_start(&self, source: SourceId, app_id: &AppId) {
        self.started
            .lock()
            .expect("lock")
            .push((source, app_id.as_str().to_owned()));
    }

    fn on_fetch_complete(&self, outcome: &FetchOutcome) {
        self.completed
            .lock()
            .expect("lock")
            .push((outcome.source(), outcome.ok()));
    }

    fn on_batch_complete(&self, summary: &BatchSummary, _duration: Duration) {
        self.batches.lock().expect("lock").push(*summary);
    }
}

#[tokio::test]
async fn precedence_scenario_merges_two_sources() {
    let collector = Collector::builder()
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(dota_spy()))
        .with_clock(clock())
        .build()
        .expect("collector");

    let batch = collector.collect(&request(&["570"])).await;

    let record = batch.records().next().expect("570 merges");
    assert_eq!(record.get(Field::Name), &FieldValue::Text(String::from("Dota 2")));
    assert_eq!(record.get(Field::PriceFinal), &FieldValue::Float(0.0));
    assert_eq!(record.get(Field::Ccu), &FieldValue::Integer(500000));
    assert_eq!(record.get(Field::SteamAppid), &FieldValue::Text(String::from("570")));
    assert!(!batch.has_failures());
}

#[tokio::test]
async fn unknown_identifier_yields_failure_descriptor() {
    let collector = Collector::builder()
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(dota_spy()))
        .with_source(Arc::new(StaticSource::new(SourceId::ProtonDb)))
        .build()
        .expect("collector");

    let batch = collector.collect(&request(&["999999"])).await;

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.records().count(), 0);
    let BatchEntry::Failed(failure) = &batch.entries()[0] else {
        panic!("expected a failure descriptor, got {:?}", batch.entries()[0]);
    };
    assert_eq!(failure.app_id.as_str(), "999999");
    assert_eq!(
        failure.kinds(),
        vec![
            (SourceId::SteamStore, SourceErrorKind::NotFound),
            (SourceId::SteamSpy, SourceErrorKind::NotFound),
            (SourceId::ProtonDb, SourceErrorKind::NotFound),
        ]
    );
    assert!(batch.has_failures());
}

#[tokio::test]
async fn output_order_matches_input_despite_completion_order() {
    // Slow source answers the first identifier only; the rest finish first.
    let slow = StaticSource::new(SourceId::SteamCharts)
        .respond("10", json!({ "name": "Counter-Strike" }))
        .with_delay(Duration::from_millis(30));
    let fast = StaticSource::new(SourceId::SteamSpy)
        .respond("570", json!({ "name": "Dota 2" }))
        .respond("730", json!({ "name": "Counter-Strike 2" }));
    let collector = Collector::builder()
        .with_source(Arc::new(slow))
        .with_source(Arc::new(fast))
        .build()
        .expect("collector");
    let ids = ["10", "999999", "570", "730", "570"];

    let batch = collector.collect(&request(&ids)).await;

    let order = batch
        .entries()
        .iter()
        .map(|entry| entry.app_id().as_str().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(order, ids);
    assert!(batch.entries()[0].is_success());
    assert!(!batch.entries()[1].is_success());
    assert_eq!(batch.entries()[2].data_json(), batch.entries()[4].data_json());
}

#[tokio::test]
async fn one_failing_source_never_aborts_the_others() {
    let collector = Collector::builder()
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(
            StaticSource::new(SourceId::SteamReview).fail_all(SourceError::transport("reset")),
        ))
        .with_source(Arc::new(
            StaticSource::new(SourceId::ProtonDb).respond_all(json!({ "tier": "platinum" })),
        ))
        .build()
        .expect("collector");

    let batch = collector.collect(&request(&["570"])).await;

    let record = batch.records().next().expect("partial success is a record");
    assert_eq!(record.get(Field::ProtondbTier).as_text(), Some("platinum"));
    assert!(record.get(Field::TotalReviews).is_unknown());
    let outcomes = batch.entries()[0].outcomes();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[1].source, SourceId::SteamReview);
    assert_eq!(outcomes[1].error, Some(SourceErrorKind::TransportError));

    let envelope = batch.to_envelope().expect("valid envelope");
    assert!(envelope.errors.is_empty());
    assert_eq!(envelope.meta.warnings, vec!["steamreview failed for appid 570: transport_error"]);
}

#[tokio::test]
async fn recap_projects_only_the_recap_keys() {
    let collector = Collector::builder()
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(dota_spy()))
        .with_clock(clock())
        .build()
        .expect("collector");

    let full = collector.collect(&request(&["570"])).await;
    let recap = collector
        .collect(&request(&["570"]).with_recap(true))
        .await;

    let record = full.records().next().expect("record");
    let projected = recap.recaps().next().expect("recap");
    assert_eq!(projected.fields().count(), DEFAULT_RECAP_KEYS.len());
    for field in projected.fields() {
        assert_eq!(projected.get(field), Some(record.get(field)), "{}", field.as_str());
    }
    assert_eq!(projected.get(Field::Ccu), None);
    assert_eq!(projected.get(Field::DaysSinceRelease), Some(&FieldValue::Integer(3980)));
}

#[tokio::test]
async fn repeated_collection_is_identical_with_fixed_clock() {
    let collector = Collector::builder()
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(dota_spy()))
        .with_clock(clock())
        .build()
        .expect("collector");

    let first = collector.collect(&request(&["570", "999999"])).await;
    let second = collector.collect(&request(&["570", "999999"])).await;

    assert_eq!(
        first.records().collect::<Vec<_>>(),
        second.records().collect::<Vec<_>>()
    );
    assert_eq!(
        first.failures().next().map(|f| f.kinds()),
        second.failures().next().map(|f| f.kinds())
    );
}

#[tokio::test]
async fn source_selection_limits_calls() {
    let store = Arc::new(dota_store());
    let spy = Arc::new(dota_spy());
    let collector = Collector::builder()
        .with_source(store.clone())
        .with_source(spy.clone())
        .build()
        .expect("collector");

    let selection = SourceSelection::parse(["steamspy"]).expect("valid selection");
    let batch = collector
        .collect(&request(&["570"]).with_sources(selection))
        .await;

    assert_eq!(store.calls(), 0);
    assert_eq!(spy.calls(), 1);
    assert_eq!(batch.sources(), [SourceId::SteamSpy]);
    let record = batch.records().next().expect("record");
    assert_eq!(record.get(Field::Name).as_text(), Some("Dota 2 (spy)"));
}

#[tokio::test(start_paused = true)]
async fn slow_source_reports_timeout() {
    let config = CollectorConfig::default().with_fetch_timeout(Duration::from_secs(2));
    let collector = Collector::builder()
        .with_config(config)
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(
            StaticSource::new(SourceId::SteamCharts)
                .respond_all(json!({ "peak_24h": 1 }))
                .with_delay(Duration::from_secs(60)),
        ))
        .build()
        .expect("collector");

    let batch = collector.collect(&request(&["570"])).await;

    let outcomes = batch.entries()[0].outcomes();
    assert!(batch.entries()[0].is_success());
    assert_eq!(outcomes[1].source, SourceId::SteamCharts);
    assert_eq!(outcomes[1].error, Some(SourceErrorKind::Timeout));
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_finished_identifiers() {
    let config = CollectorConfig::default().with_max_in_flight(1);
    let collector = Collector::builder()
        .with_config(config)
        .with_source(Arc::new(
            StaticSource::new(SourceId::SteamSpy)
                .respond_all(json!({ "name": "any" }))
                .with_delay(Duration::from_secs(5)),
        ))
        .build()
        .expect("collector");
    let cancel = CancelSignal::new();

    let handle = {
        let collector = collector.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            collector
                .collect_with_cancel(&request(&["570", "730"]), cancel)
                .await
        })
    };
    tokio::time::sleep(Duration::from_secs(7)).await;
    cancel.cancel();
    let batch = handle.await.expect("collection task joins");

    assert!(batch.entries()[0].is_success());
    assert!(matches!(&batch.entries()[1], BatchEntry::Cancelled { app_id } if app_id.as_str() == "730"));
    assert_eq!(batch.summary().cancelled, 1);

    let envelope = batch.to_envelope().expect("valid envelope");
    assert_eq!(envelope.errors[0].code, "batch.cancelled");
}

#[tokio::test(start_paused = true)]
async fn aggregate_refusal_reports_rate_limited_from_every_source() {
    let aggregate = RateGovernor::new(
        GovernorScope::Aggregate,
        RateLimit::new(1, Duration::from_secs(60)).expect("valid limit"),
        Duration::ZERO,
    );
    let collector = Collector::builder()
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(dota_spy()))
        .with_governor(aggregate)
        .build()
        .expect("collector");

    let batch = collector.collect(&request(&["570", "570"])).await;

    let summary = batch.summary();
    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    let failure = batch.failures().next().expect("second identifier refused");
    assert_eq!(
        failure.kinds(),
        vec![
            (SourceId::SteamStore, SourceErrorKind::RateLimited),
            (SourceId::SteamSpy, SourceErrorKind::RateLimited),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_source_governor_refuses_without_calling() {
    let spy = Arc::new(dota_spy());
    let governor = RateGovernor::new(
        GovernorScope::Source(SourceId::SteamSpy),
        RateLimit::new(1, Duration::from_secs(60)).expect("valid limit"),
        Duration::from_secs(1),
    );
    let collector = Collector::builder()
        .with_source(spy.clone())
        .with_governor(governor)
        .build()
        .expect("collector");

    let batch = collector.collect(&request(&["570", "570"])).await;

    assert_eq!(spy.calls(), 1);
    let failure = batch.failures().next().expect("one refused");
    assert_eq!(failure.kinds(), vec![(SourceId::SteamSpy, SourceErrorKind::RateLimited)]);
}

#[tokio::test]
async fn observer_sees_every_call_and_the_batch() {
    let observer = Arc::new(RecordingObserver::default());
    let collector = Collector::builder()
        .with_source(Arc::new(dota_store()))
        .with_source(Arc::new(dota_spy()))
        .with_observer(observer.clone())
        .build()
        .expect("collector");

    collector.collect(&request(&["570", "999999"])).await;

    assert_eq!(observer.started.lock().expect("lock").len(), 4);
    let completed = observer.completed.lock().expect("lock");
    assert_eq!(completed.len(), 4);
    assert_eq!(completed.iter().filter(|(_, ok)| *ok).count(), 2);
    let batches = observer.batches.lock().expect("lock");
    assert_eq!(batches.len(), 1);
    assert_eq!((batches[0].total, batches[0].succeeded, batches[0].failed), (2, 1, 1));
}

#[tokio::test]
async fn observer_hooks_pair_up_for_sources_that_are_never_called() {
    let observer = Arc::new(RecordingObserver::default());
    let collector = Collector::builder()
        .with_source(Arc::new(dota_spy()))
        .with_source(Arc::new(
            StaticSource::new(SourceId::SteamAchievements)
                .with_config_error(SourceError::config("steam api key is not set")),
        ))
        .with_source(Arc::new(
            StaticSource::new(SourceId::HowLongToBeat).respond_all(json!({ "comp_main_avg": 3600 })),
        ))
        .with_observer(observer.clone())
        .build()
        .expect("collector");

    // 999999 resolves no name, so HowLongToBeat is settled without a call.
    collector.collect(&request(&["570", "999999"])).await;

    let started = observer.started.lock().expect("lock");
    let completed = observer.completed.lock().expect("lock");
    assert_eq!(started.len(), completed.len());
    assert_eq!(started.len(), 6);
    for source in [SourceId::SteamAchievements, SourceId::HowLongToBeat] {
        let starts = started.iter().filter(|(s, _)| *s == source).count();
        let completes = completed.iter().filter(|(s, _)| *s == source).count();
        assert_eq!(starts, completes, "{source}");
    }
}
