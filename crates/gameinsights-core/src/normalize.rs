//! Normalizer / merger.
//!
//! Maps provider payloads onto the canonical schema. Each field has a static
//! binding list: `(source, payload key, unit conversion)` in precedence
//! order. The first binding whose source returned `ok` and whose value
//! coerces to the field's kind wins; arrival order never matters. A value
//! that fails coercion degrades only that candidate.
//!
//! Unit conversions happen before merge:
//!
//! | Conversion | Used for |
//! |------------|----------|
//! | cents to units | Steam Store and SteamSpy prices |
//! | minutes to hours | SteamSpy `average_forever` |
//! | seconds to minutes | HowLongToBeat completion times |
//! | range midpoint | SteamSpy `owners` ("a .. b") |
//!
//! Derived fields use the collection clock passed to [`Normalizer::merge`]:
//! `steam_appid` is the identifier, `average_playtime` is
//! `average_playtime_h * 3600` seconds, truncated, and `days_since_release`
//! is the whole-day distance from `release_date`.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::data_source::{FetchOutcome, SourcePayload};
use crate::schema::{CanonicalRecord, Field, FieldKind, FieldValue, SeriesPoint};
use crate::{date_from_epoch, parse_calendar_date, AppId, SourceId, UtcDateTime};

/// Unit conversion applied to a provider value before it is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    AsIs,
    CentsToUnits,
    MinutesToHours,
    SecondsToMinutes,
    RangeMidpoint,
}

/// One provider's claim on a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub source: SourceId,
    pub key: &'static str,
    pub conversion: Conversion,
}

const fn bind(source: SourceId, key: &'static str) -> Binding {
    Binding {
        source,
        key,
        conversion: Conversion::AsIs,
    }
}

const fn convert(source: SourceId, key: &'static str, conversion: Conversion) -> Binding {
    Binding {
        source,
        key,
        conversion,
    }
}

use self::Conversion::{CentsToUnits, MinutesToHours, RangeMidpoint, SecondsToMinutes};
use crate::SourceId::{
    Gamalytic, HowLongToBeat, ProtonDb, SteamAchievements, SteamCharts, SteamReview, SteamSpy,
    SteamStore,
};

macro_rules! table {
    ($($binding:expr),* $(,)?) => {{
        const BINDINGS: &[Binding] = &[$($binding),*];
        BINDINGS
    }};
}

/// Bindings for `field`, highest precedence first. Derived fields have none.
pub fn bindings(field: Field) -> &'static [Binding] {
    match field {
        Field::SteamAppid | Field::DaysSinceRelease | Field::AveragePlaytime => table![],
        Field::Name => table![
            bind(SteamStore, "name"),
            bind(SteamSpy, "name"),
            bind(Gamalytic, "name"),
            bind(SteamCharts, "name"),
        ],
        Field::Developers => table![bind(SteamStore, "developers"), bind(SteamSpy, "developer")],
        Field::Publishers => table![bind(SteamStore, "publishers"), bind(SteamSpy, "publisher")],
        Field::Type => table![bind(SteamStore, "type")],
        Field::IsFree => table![bind(SteamStore, "is_free")],
        Field::IsComingSoon => table![bind(SteamStore, "is_coming_soon")],
        Field::Recommendations => table![bind(SteamStore, "recommendations")],
        Field::Discount => table![bind(SteamSpy, "discount")],
        Field::PriceCurrency => table![bind(SteamStore, "currency")],
        Field::PriceInitial => table![
            convert(SteamStore, "initial", CentsToUnits),
            convert(SteamSpy, "initialprice", CentsToUnits),
        ],
        Field::PriceFinal => table![
            convert(SteamStore, "final", CentsToUnits),
            bind(Gamalytic, "price"),
            convert(SteamSpy, "price", CentsToUnits),
        ],
        Field::MetacriticScore => table![bind(SteamStore, "metacritic")],
        Field::ReleaseDate => table![bind(SteamStore, "release_date"), bind(Gamalytic, "releaseDate")],
        Field::AveragePlaytimeH => table![
            bind(Gamalytic, "avgPlaytime"),
            convert(SteamSpy, "average_forever", MinutesToHours),
        ],
        Field::CopiesSold => table![bind(Gamalytic, "copiesSold")],
        Field::EstimatedRevenue => table![bind(Gamalytic, "revenue")],
        Field::Owners => table![
            bind(Gamalytic, "owners"),
            convert(SteamSpy, "owners", RangeMidpoint),
        ],
        Field::Followers => table![bind(Gamalytic, "followers")],
        Field::EarlyAccess => table![bind(Gamalytic, "earlyAccess")],
        Field::Ccu => table![bind(SteamSpy, "ccu"), bind(SteamCharts, "current_players")],
        Field::ActivePlayer24h => table![bind(SteamCharts, "peak_24h")],
        Field::PeakActivePlayerAllTime => table![bind(SteamCharts, "peak_all_time")],
        Field::MonthlyActivePlayer => table![bind(SteamCharts, "monthly")],
        Field::ReviewScore => table![bind(SteamReview, "review_score")],
        Field::ReviewScoreDesc => table![bind(SteamReview, "review_score_desc")],
        Field::TotalPositive => table![bind(SteamReview, "total_positive"), bind(SteamSpy, "positive")],
        Field::TotalNegative => table![bind(SteamReview, "total_negative"), bind(SteamSpy, "negative")],
        Field::TotalReviews => table![bind(SteamReview, "total_reviews"), bind(Gamalytic, "reviews")],
        Field::AchievementsCount => table![bind(SteamAchievements, "count")],
        Field::AchievementsPercentageAverage => table![bind(SteamAchievements, "percentage_average")],
        Field::AchievementsList => table![bind(SteamAchievements, "achievements")],
        Field::CompMain => table![convert(HowLongToBeat, "comp_main_avg", SecondsToMinutes)],
        Field::CompPlus => table![convert(HowLongToBeat, "comp_plus_avg", SecondsToMinutes)],
        Field::Comp100 => table![convert(HowLongToBeat, "comp_100_avg", SecondsToMinutes)],
        Field::CompAll => table![convert(HowLongToBeat, "comp_all_avg", SecondsToMinutes)],
        Field::CompMainCount => table![bind(HowLongToBeat, "comp_main_count")],
        Field::CompPlusCount => table![bind(HowLongToBeat, "comp_plus_count")],
        Field::Comp100Count => table![bind(HowLongToBeat, "comp_100_count")],
        Field::CompAllCount => table![bind(HowLongToBeat, "comp_all_count")],
        Field::InvestedCo => table![convert(HowLongToBeat, "invested_co_avg", SecondsToMinutes)],
        Field::InvestedMp => table![convert(HowLongToBeat, "invested_mp_avg", SecondsToMinutes)],
        Field::InvestedCoCount => table![bind(HowLongToBeat, "invested_co_count")],
        Field::InvestedMpCount => table![bind(HowLongToBeat, "invested_mp_count")],
        Field::CountComp => table![bind(HowLongToBeat, "count_comp")],
        Field::CountSpeedRun => table![bind(HowLongToBeat, "count_speed_run")],
        Field::CountBacklog => table![bind(HowLongToBeat, "count_backlog")],
        Field::CountReview => table![bind(HowLongToBeat, "count_review")],
        Field::HltbReviewScore => table![bind(HowLongToBeat, "review_score")],
        Field::CountPlaying => table![bind(HowLongToBeat, "count_playing")],
        Field::CountRetired => table![bind(HowLongToBeat, "count_retired")],
        Field::Languages => table![bind(Gamalytic, "languages"), bind(SteamSpy, "languages")],
        Field::Platforms => table![bind(SteamStore, "platforms")],
        Field::Categories => table![bind(SteamStore, "categories")],
        Field::Genres => table![bind(SteamStore, "genres"), bind(SteamSpy, "genre")],
        Field::Tags => table![bind(SteamSpy, "tags")],
        Field::ContentRating => table![bind(SteamStore, "content_rating")],
        Field::ProtondbTier => table![bind(ProtonDb, "tier")],
        Field::ProtondbScore => table![bind(ProtonDb, "score")],
        Field::ProtondbTrending => table![bind(ProtonDb, "trendingTier")],
        Field::ProtondbConfidence => table![bind(ProtonDb, "confidence")],
        Field::ProtondbTotal => table![bind(ProtonDb, "total")],
    }
}

/// Source precedence for `field`, highest first.
pub fn precedence(field: Field) -> Vec<SourceId> {
    bindings(field).iter().map(|binding| binding.source).collect()
}

/// Canonical fields `source` can supply.
pub fn fields_supplied_by(source: SourceId) -> Vec<Field> {
    Field::ALL
        .iter()
        .copied()
        .filter(|field| bindings(*field).iter().any(|b| b.source == source))
        .collect()
}

/// Builds canonical records from fetch outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Merges the `ok` outcomes for `app_id` into one record.
    ///
    /// Outcomes for other identifiers are ignored. Never fails: fields with
    /// no usable candidate are [`FieldValue::Unknown`].
    pub fn merge(
        &self,
        app_id: &AppId,
        outcomes: &[FetchOutcome],
        collected_at: UtcDateTime,
    ) -> CanonicalRecord {
        let payloads = payloads_by_source(app_id, outcomes);

        let mut values = Field::ALL
            .iter()
            .map(|field| resolve(*field, &payloads))
            .collect::<Vec<_>>();

        values[Field::SteamAppid.index()] = FieldValue::Text(app_id.as_str().to_owned());
        if let Some(hours) = values[Field::AveragePlaytimeH.index()].as_float() {
            values[Field::AveragePlaytime.index()] = float_to_integer((hours * 3600.0).trunc())
                .map_or(FieldValue::Unknown, FieldValue::Integer);
        }
        if let Some(release) = values[Field::ReleaseDate.index()].as_date() {
            let days = (collected_at.date() - release).whole_days();
            values[Field::DaysSinceRelease.index()] = FieldValue::Integer(days);
        }

        CanonicalRecord::from_values(app_id.clone(), values)
    }
}

/// One payload per source. Duplicate outcomes for a source resolve to the
/// payload with the most keys, then the smallest serialized form.
fn payloads_by_source<'a>(
    app_id: &AppId,
    outcomes: &'a [FetchOutcome],
) -> BTreeMap<SourceId, &'a SourcePayload> {
    let mut payloads: BTreeMap<SourceId, &SourcePayload> = BTreeMap::new();
    for outcome in outcomes.iter().filter(|o| o.identifier() == app_id) {
        let Some(payload) = outcome.payload() else {
            continue;
        };
        payloads
            .entry(outcome.source())
            .and_modify(|current| {
                if rank(payload) < rank(current) {
                    *current = payload;
                }
            })
            .or_insert(payload);
    }
    payloads
}

fn rank(payload: &SourcePayload) -> (std::cmp::Reverse<usize>, String) {
    (
        std::cmp::Reverse(payload.len()),
        Value::Object(payload.clone()).to_string(),
    )
}

fn resolve(field: Field, payloads: &BTreeMap<SourceId, &SourcePayload>) -> FieldValue {
    for binding in bindings(field) {
        let Some(raw) = payloads.get(&binding.source).and_then(|p| p.get(binding.key)) else {
            continue;
        };
        match coerce(raw, field.kind(), binding.conversion) {
            Some(value) => return value,
            None => debug!(
                field = field.as_str(),
                source = %binding.source,
                key = binding.key,
                "provider value did not coerce; trying next source"
            ),
        }
    }
    FieldValue::Unknown
}

/// Coerces a provider value into `kind`, applying `conversion` first.
pub fn coerce(raw: &Value, kind: FieldKind, conversion: Conversion) -> Option<FieldValue> {
    match conversion {
        Conversion::AsIs => coerce_kind(raw, kind),
        Conversion::CentsToUnits => number(raw).map(|cents| cents / 100.0).and_then(|v| fit(v, kind)),
        Conversion::MinutesToHours => number(raw).map(|minutes| minutes / 60.0).and_then(|v| fit(v, kind)),
        Conversion::SecondsToMinutes => number(raw)
            .map(|seconds| (seconds / 60.0).floor())
            .and_then(|v| fit(v, kind)),
        Conversion::RangeMidpoint => range_midpoint(raw)
            .or_else(|| number(raw))
            .and_then(|v| fit(v, kind)),
    }
}

fn coerce_kind(raw: &Value, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => text(raw).map(FieldValue::Text),
        FieldKind::Integer | FieldKind::Float => number(raw).and_then(|v| fit(v, kind)),
        FieldKind::Date => date(raw).map(FieldValue::Date),
        FieldKind::Flag => flag(raw).map(FieldValue::Flag),
        FieldKind::TextList => text_list(raw).map(FieldValue::TextList),
        FieldKind::Series => series(raw).map(FieldValue::Series),
        FieldKind::Table => table(raw).map(FieldValue::Table),
    }
}

/// Places a converted number into a numeric kind.
fn fit(value: f64, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Float => Some(FieldValue::Float(value)),
        FieldKind::Integer => float_to_integer(value.trunc()).map(FieldValue::Integer),
        _ => None,
    }
}

fn float_to_integer(value: f64) -> Option<i64> {
    (value.is_finite() && value >= i64::MIN as f64 && value <= i64::MAX as f64)
        .then_some(value as i64)
}

fn text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// JSON numbers, or numeric strings with thousands separators.
fn number(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn date(raw: &Value) -> Option<time::Date> {
    match raw {
        Value::String(text) => parse_calendar_date(text),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(|v| float_to_integer(v.trunc())))
            .and_then(date_from_epoch),
        _ => None,
    }
}

fn flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text_list(raw: &Value) -> Option<Vec<String>> {
    match raw {
        Value::Array(items) => Some(items.iter().filter_map(text).collect()),
        Value::String(joined) => {
            let items = joined
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>();
            (!items.is_empty()).then_some(items)
        }
        _ => None,
    }
}

fn series(raw: &Value) -> Option<Vec<SeriesPoint>> {
    let points = raw
        .as_array()?
        .iter()
        .filter_map(|point| serde_json::from_value::<SeriesPoint>(point.clone()).ok())
        .collect();
    Some(points)
}

fn table(raw: &Value) -> Option<Vec<serde_json::Map<String, Value>>> {
    let rows = raw
        .as_array()?
        .iter()
        .filter_map(|row| row.as_object().cloned())
        .collect();
    Some(rows)
}

/// `"1,000,000 .. 2,000,000"` to `1500000`.
fn range_midpoint(raw: &Value) -> Option<f64> {
    let (low, high) = raw.as_str()?.split_once("..")?;
    let low = number(&Value::String(low.to_owned()))?;
    let high = number(&Value::String(high.to_owned()))?;
    Some(((low + high) / 2.0).floor())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::{Date, Month};

    use super::*;
    use crate::data_source::SourceError;

    fn app_id() -> AppId {
        AppId::parse("570").expect("valid id")
    }

    fn ok(source: SourceId, payload: Value) -> FetchOutcome {
        let Value::Object(map) = payload else {
            panic!("payload must be an object");
        };
        FetchOutcome::success(source, app_id(), map)
    }

    fn clock() -> UtcDateTime {
        UtcDateTime::parse("2024-01-11T12:00:00Z").expect("valid clock")
    }

    #[test]
    fn every_overlapping_field_has_a_total_order() {
        for field in Field::ALL {
            let sources = precedence(*field);
            let mut unique = sources.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), sources.len(), "{field} lists a source twice");
        }
    }

    #[test]
    fn higher_precedence_source_wins() {
        let outcomes = vec![
            ok(SteamSpy, json!({ "name": "dota 2", "price": "999", "ccu": 500000 })),
            ok(SteamStore, json!({ "name": "Dota 2", "final": 0 })),
        ];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(record.get(Field::Name), &FieldValue::Text("Dota 2".into()));
        assert_eq!(record.get(Field::PriceFinal), &FieldValue::Float(0.0));
        assert_eq!(record.get(Field::Ccu), &FieldValue::Integer(500_000));
    }

    #[test]
    fn malformed_candidate_falls_through_to_next_source() {
        let outcomes = vec![
            ok(SteamReview, json!({ "total_positive": [1234] })),
            ok(SteamSpy, json!({ "positive": "1,234" })),
        ];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(record.get(Field::TotalPositive), &FieldValue::Integer(1234));
    }

    #[test]
    fn failed_outcomes_contribute_nothing() {
        let outcomes = vec![
            FetchOutcome::failure(SteamStore, app_id(), SourceError::timeout("slow")),
            ok(SteamSpy, json!({ "name": "Dota 2" })),
        ];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(record.get(Field::Name), &FieldValue::Text("Dota 2".into()));
        assert!(record.get(Field::PriceFinal).is_unknown());
        assert_eq!(record.get(Field::SteamAppid), &FieldValue::Text("570".into()));
    }

    #[test]
    fn converts_units_before_merge() {
        let outcomes = vec![
            ok(
                SteamSpy,
                json!({
                    "initialprice": "1999",
                    "average_forever": 90,
                    "owners": "1,000,000 .. 2,000,000"
                }),
            ),
            ok(HowLongToBeat, json!({ "comp_main_avg": 7290, "comp_main_count": 120 })),
        ];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(record.get(Field::PriceInitial), &FieldValue::Float(19.99));
        assert_eq!(record.get(Field::AveragePlaytimeH), &FieldValue::Float(1.5));
        assert_eq!(record.get(Field::AveragePlaytime), &FieldValue::Integer(5400));
        assert_eq!(record.get(Field::Owners), &FieldValue::Integer(1_500_000));
        assert_eq!(record.get(Field::CompMain), &FieldValue::Integer(121));
        assert_eq!(record.get(Field::CompMainCount), &FieldValue::Integer(120));
    }

    #[test]
    fn derives_days_since_release_from_clock() {
        let outcomes = vec![ok(SteamStore, json!({ "release_date": "Jan 1, 2024" }))];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(
            record.get(Field::ReleaseDate),
            &FieldValue::Date(Date::from_calendar_date(2024, Month::January, 1).expect("date"))
        );
        assert_eq!(record.get(Field::DaysSinceRelease), &FieldValue::Integer(10));
    }

    #[test]
    fn gamalytic_epoch_release_date_is_accepted() {
        let outcomes = vec![ok(Gamalytic, json!({ "releaseDate": 1_704_067_200_000_i64 }))];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(record.get(Field::DaysSinceRelease), &FieldValue::Integer(10));
    }

    #[test]
    fn out_of_range_epoch_release_date_degrades_to_unknown() {
        let outcomes = vec![ok(
            Gamalytic,
            json!({ "name": "Dota 2", "releaseDate": i64::MIN }),
        )];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert!(record.get(Field::ReleaseDate).is_unknown());
        assert!(record.get(Field::DaysSinceRelease).is_unknown());
        assert_eq!(record.get(Field::Name), &FieldValue::Text("Dota 2".into()));
    }

    #[test]
    fn average_playtime_seconds_are_truncated() {
        let outcomes = vec![ok(Gamalytic, json!({ "avgPlaytime": 0.0005 }))];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(record.get(Field::AveragePlaytime), &FieldValue::Integer(1));
    }

    #[test]
    fn text_lists_accept_arrays_and_comma_strings() {
        let outcomes = vec![ok(
            SteamSpy,
            json!({ "developer": "Valve, Hidden Path", "languages": "English, German", "tags": [] }),
        )];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(
            record.get(Field::Developers),
            &FieldValue::TextList(vec!["Valve".into(), "Hidden Path".into()])
        );
        assert_eq!(record.get(Field::Tags), &FieldValue::TextList(Vec::new()));
        assert!(record.get(Field::Categories).is_unknown());
    }

    #[test]
    fn wrong_shape_degrades_only_that_field() {
        let outcomes = vec![ok(
            SteamStore,
            json!({ "name": "Dota 2", "is_free": "maybe", "metacritic": { "score": 90 } }),
        )];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert_eq!(record.get(Field::Name), &FieldValue::Text("Dota 2".into()));
        assert!(record.get(Field::IsFree).is_unknown());
        assert!(record.get(Field::MetacriticScore).is_unknown());
    }

    #[test]
    fn coercion_rejects_non_finite_and_odd_values() {
        assert_eq!(coerce(&json!("NaN"), FieldKind::Float, Conversion::AsIs), None);
        assert_eq!(coerce(&json!(true), FieldKind::Integer, Conversion::AsIs), None);
        assert_eq!(
            coerce(&json!(12.9), FieldKind::Integer, Conversion::AsIs),
            Some(FieldValue::Integer(12))
        );
        assert_eq!(coerce(&json!("Coming soon"), FieldKind::Date, Conversion::AsIs), None);
    }

    #[test]
    fn merge_ignores_outcomes_for_other_identifiers() {
        let other = AppId::parse("10").expect("valid id");
        let mut map = serde_json::Map::new();
        map.insert("name".into(), json!("Counter-Strike"));
        let outcomes = vec![FetchOutcome::success(SteamStore, other, map)];

        let record = Normalizer::new().merge(&app_id(), &outcomes, clock());

        assert!(record.get(Field::Name).is_unknown());
    }

    #[test]
    fn fields_supplied_by_lists_provider_coverage() {
        let protondb = fields_supplied_by(ProtonDb);
        assert_eq!(protondb.len(), 5);
        assert!(fields_supplied_by(SteamStore).contains(&Field::Name));
    }
}
