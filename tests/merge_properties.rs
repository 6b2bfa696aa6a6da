use gameinsights_core::{
    AppId, FetchOutcome, Field, FieldValue, Normalizer, SourceError, SourceId, UtcDateTime,
};
use gameinsights_tests::clock_at;
use serde_json::{json, Value};

fn app_id() -> AppId {
    gameinsights_tests::app_id("570")
}

fn clock() -> UtcDateTime {
    clock_at("2024-06-01T12:00:00Z")
}

fn ok(source: SourceId, payload: Value) -> FetchOutcome {
    gameinsights_tests::ok(source, "570", payload)
}

fn outcomes() -> Vec<FetchOutcome> {
    vec![
        ok(
            SourceId::SteamStore,
            json!({ "name": "Dota 2", "final": 0, "release_date": "2013-07-09", "genres": ["Action"] }),
        ),
        ok(
            SourceId::SteamSpy,
            json!({
                "name": "DOTA",
                "price": 1999,
                "ccu": 500000,
                "average_forever": 90,
                "owners": "100,000,000 .. 200,000,000",
                "genre": "Action, Strategy"
            }),
        ),
        ok(
            SourceId::Gamalytic,
            json!({ "avgPlaytime": 1.25, "owners": "not a number", "price": 0 }),
        ),
        FetchOutcome::failure(SourceId::SteamReview, app_id(), SourceError::timeout("slow")),
        // Duplicate answer from one source; the richer payload wins either way.
        ok(SourceId::SteamCharts, json!({ "peak_24h": 700000 })),
        ok(SourceId::SteamCharts, json!({ "peak_24h": 650000, "peak_all_time": 1295114 })),
    ]
}

fn permutations(items: &[FetchOutcome]) -> Vec<Vec<FetchOutcome>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut all = Vec::new();
    for index in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(index);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            all.push(tail);
        }
    }
    all
}

#[test]
fn arrival_order_never_changes_the_record() {
    let normalizer = Normalizer::new();
    let expected = normalizer.merge(&app_id(), &outcomes(), clock());

    for permutation in permutations(&outcomes()) {
        assert_eq!(normalizer.merge(&app_id(), &permutation, clock()), expected);
    }
}

#[test]
fn merge_is_idempotent_for_fixed_inputs_and_clock() {
    let normalizer = Normalizer::new();

    let first = normalizer.merge(&app_id(), &outcomes(), clock());
    let second = normalizer.merge(&app_id(), &outcomes(), clock());

    assert_eq!(first, second);
    assert_eq!(first.to_json(), second.to_json());
}

#[test]
fn precedence_units_and_fallthrough() {
    let record = Normalizer::new().merge(&app_id(), &outcomes(), clock());

    assert_eq!(record.get(Field::Name).as_text(), Some("Dota 2"));
    assert_eq!(record.get(Field::PriceFinal), &FieldValue::Float(0.0));
    assert_eq!(record.get(Field::AveragePlaytimeH), &FieldValue::Float(1.25));
    assert_eq!(record.get(Field::AveragePlaytime), &FieldValue::Integer(4500));
    // Gamalytic owners does not coerce, so the SteamSpy range midpoint is used.
    assert_eq!(record.get(Field::Owners), &FieldValue::Integer(150_000_000));
    assert_eq!(
        record.get(Field::Genres),
        &FieldValue::TextList(vec![String::from("Action")])
    );
    assert_eq!(record.get(Field::ActivePlayer24h), &FieldValue::Integer(650000));
    assert_eq!(record.get(Field::PeakActivePlayerAllTime), &FieldValue::Integer(1295114));
    assert_eq!(record.get(Field::DaysSinceRelease), &FieldValue::Integer(3980));
}

#[test]
fn failed_outcomes_contribute_nothing() {
    let record = Normalizer::new().merge(&app_id(), &outcomes(), clock());

    assert!(record.get(Field::ReviewScore).is_unknown());
    assert!(record.get(Field::TotalReviews).is_unknown());
    assert_eq!(record.to_json()["total_reviews"], Value::Null);
    assert_eq!(record.to_json()["tags"], json!([]));
}

#[test]
fn record_json_lists_every_field_in_schema_order() {
    let record = Normalizer::new().merge(&app_id(), &outcomes(), clock());

    let json = record.to_json();
    let keys = json
        .as_object()
        .expect("object")
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    let schema = Field::ALL
        .iter()
        .map(|field| field.as_str().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(keys.len(), schema.len());

    let serialized = serde_json::to_string(&record).expect("serializes");
    let positions = schema
        .iter()
        .map(|key| serialized.find(&format!("\"{key}\":")).expect("key present"))
        .collect::<Vec<_>>();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}
