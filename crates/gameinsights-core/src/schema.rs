//! Canonical record schema.
//!
//! Every [`CanonicalRecord`] carries every [`Field`] in schema order. A field
//! no provider supplied holds [`FieldValue::Unknown`], which serializes as
//! `null` for scalar kinds and `[]` for list kinds.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use time::Date;

use crate::{format_calendar_date, AppId, ValidationError};

/// Version of the canonical field set and recap key set.
pub const SCHEMA_VERSION: &str = "v1.0.0";

/// Semantic type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Date,
    Flag,
    TextList,
    Series,
    Table,
}

impl FieldKind {
    /// List kinds use `[]` as their unknown sentinel.
    pub const fn is_list(self) -> bool {
        matches!(self, Self::TextList | Self::Series | Self::Table)
    }
}

macro_rules! canonical_fields {
    ($($variant:ident => $name:literal : $kind:ident,)+) => {
        /// Canonical field names, declared in schema order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Field {
            $($variant,)+
        }

        impl Field {
            pub const ALL: &'static [Field] = &[$(Field::$variant,)+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Field::$variant => $name,)+
                }
            }

            pub const fn kind(self) -> FieldKind {
                match self {
                    $(Field::$variant => FieldKind::$kind,)+
                }
            }
        }
    };
}

canonical_fields! {
    SteamAppid => "steam_appid": Text,
    Name => "name": Text,
    Developers => "developers": TextList,
    Publishers => "publishers": TextList,
    Type => "type": Text,
    IsFree => "is_free": Flag,
    IsComingSoon => "is_coming_soon": Flag,
    Recommendations => "recommendations": Integer,
    Discount => "discount": Float,
    PriceCurrency => "price_currency": Text,
    PriceInitial => "price_initial": Float,
    PriceFinal => "price_final": Float,
    MetacriticScore => "metacritic_score": Integer,
    ReleaseDate => "release_date": Date,
    DaysSinceRelease => "days_since_release": Integer,
    AveragePlaytimeH => "average_playtime_h": Float,
    AveragePlaytime => "average_playtime": Integer,
    CopiesSold => "copies_sold": Integer,
    EstimatedRevenue => "estimated_revenue": Integer,
    Owners => "owners": Integer,
    Followers => "followers": Integer,
    EarlyAccess => "early_access": Flag,
    Ccu => "ccu": Integer,
    ActivePlayer24h => "active_player_24h": Integer,
    PeakActivePlayerAllTime => "peak_active_player_all_time": Integer,
    MonthlyActivePlayer => "monthly_active_player": Series,
    ReviewScore => "review_score": Integer,
    ReviewScoreDesc => "review_score_desc": Text,
    TotalPositive => "total_positive": Integer,
    TotalNegative => "total_negative": Integer,
    TotalReviews => "total_reviews": Integer,
    AchievementsCount => "achievements_count": Integer,
    AchievementsPercentageAverage => "achievements_percentage_average": Float,
    AchievementsList => "achievements_list": Table,
    CompMain => "comp_main": Integer,
    CompPlus => "comp_plus": Integer,
    Comp100 => "comp_100": Integer,
    CompAll => "comp_all": Integer,
    CompMainCount => "comp_main_count": Integer,
    CompPlusCount => "comp_plus_count": Integer,
    Comp100Count => "comp_100_count": Integer,
    CompAllCount => "comp_all_count": Integer,
    InvestedCo => "invested_co": Integer,
    InvestedMp => "invested_mp": Integer,
    InvestedCoCount => "invested_co_count": Integer,
    InvestedMpCount => "invested_mp_count": Integer,
    CountComp => "count_comp": Integer,
    CountSpeedRun => "count_speed_run": Integer,
    CountBacklog => "count_backlog": Integer,
    CountReview => "count_review": Integer,
    HltbReviewScore => "hltb_review_score": Integer,
    CountPlaying => "count_playing": Integer,
    CountRetired => "count_retired": Integer,
    Languages => "languages": TextList,
    Platforms => "platforms": TextList,
    Categories => "categories": TextList,
    Genres => "genres": TextList,
    Tags => "tags": TextList,
    ContentRating => "content_rating": Table,
    ProtondbTier => "protondb_tier": Text,
    ProtondbScore => "protondb_score": Float,
    ProtondbTrending => "protondb_trending": Text,
    ProtondbConfidence => "protondb_confidence": Text,
    ProtondbTotal => "protondb_total": Integer,
}

impl Field {
    /// Position in schema order.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| ValidationError::UnknownField {
                value: value.to_owned(),
            })
    }
}

/// One row of the monthly active-player history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub average_players: Option<f64>,
    pub gain: Option<f64>,
    pub percentage_gain: Option<f64>,
    pub peak_players: Option<i64>,
}

/// Typed value of one canonical field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Unknown,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(Date),
    Flag(bool),
    TextList(Vec<String>),
    Series(Vec<SeriesPoint>),
    Table(Vec<Map<String, Value>>),
}

impl FieldValue {
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn as_date(&self) -> Option<Date> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[SeriesPoint]> {
        match self {
            Self::Series(points) => Some(points),
            _ => None,
        }
    }

    /// JSON form, using the unknown sentinel of `kind`.
    pub fn to_json(&self, kind: FieldKind) -> Value {
        match self {
            Self::Unknown if kind.is_list() => Value::Array(Vec::new()),
            Self::Unknown => Value::Null,
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(value) => Value::from(*value),
            Self::Float(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Date(date) => Value::String(format_calendar_date(*date)),
            Self::Flag(flag) => Value::Bool(*flag),
            Self::TextList(items) => Value::from(items.clone()),
            Self::Series(points) => serde_json::to_value(points).unwrap_or(Value::Array(Vec::new())),
            Self::Table(rows) => Value::Array(rows.iter().cloned().map(Value::Object).collect()),
        }
    }
}

/// Merged, normalized record for one identifier.
///
/// Built only by the [`Normalizer`](crate::Normalizer); immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    app_id: AppId,
    values: Vec<FieldValue>,
}

impl CanonicalRecord {
    pub(crate) fn from_values(app_id: AppId, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(values.len(), Field::ALL.len());
        Self { app_id, values }
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        self.values.get(field.index()).unwrap_or(&FieldValue::Unknown)
    }

    /// Fields and values in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        Field::ALL.iter().copied().zip(self.values.iter())
    }

    /// Number of fields holding a known value.
    pub fn known_count(&self) -> usize {
        self.values.iter().filter(|value| !value.is_unknown()).count()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(field, value)| (field.as_str().to_owned(), value.to_json(field.kind())))
                .collect(),
        )
    }
}

impl Serialize for CanonicalRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(Field::ALL.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.as_str(), &value.to_json(field.kind()))?;
        }
        map.end()
    }
}
