//! Recap projection: a fixed, versioned subset of the canonical record.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::schema::{CanonicalRecord, Field, FieldValue, SCHEMA_VERSION};
use crate::{AppId, ValidationError};

/// Default recap keys for schema `v1.0.0`.
pub const DEFAULT_RECAP_KEYS: [&str; 35] = [
    "steam_appid",
    "name",
    "developers",
    "publishers",
    "type",
    "release_date",
    "days_since_release",
    "price_currency",
    "price_initial",
    "price_final",
    "copies_sold",
    "estimated_revenue",
    "owners",
    "followers",
    "total_positive",
    "total_negative",
    "total_reviews",
    "comp_main",
    "comp_plus",
    "comp_100",
    "comp_all",
    "invested_co",
    "invested_mp",
    "average_playtime",
    "active_player_24h",
    "peak_active_player_all_time",
    "achievements_count",
    "achievements_percentage_average",
    "categories",
    "genres",
    "tags",
    "is_free",
    "protondb_tier",
    "early_access",
    "metacritic_score",
];

/// Projects canonical records down to a recap key set.
///
/// Keys are checked against the schema when the projector is built, so
/// [`RecapProjector::project`] itself cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapProjector {
    fields: Vec<Field>,
}

impl RecapProjector {
    /// Projector over [`DEFAULT_RECAP_KEYS`].
    pub fn new() -> Result<Self, ValidationError> {
        Self::with_keys(DEFAULT_RECAP_KEYS)
    }

    /// Projector over a custom key set. Keys are emitted in schema order.
    pub fn with_keys<I, S>(keys: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                key.parse::<Field>()
                    .map_err(|_| ValidationError::UnknownRecapKey {
                        key: key.to_owned(),
                        schema_version: SCHEMA_VERSION,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            return Err(ValidationError::EmptyRecapKeys);
        }
        fields.sort_unstable();
        fields.dedup();
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn project(&self, record: &CanonicalRecord) -> RecapRecord {
        RecapRecord {
            app_id: record.app_id().clone(),
            values: self
                .fields
                .iter()
                .map(|field| (*field, record.get(*field).clone()))
                .collect(),
        }
    }
}

/// Summary view of one canonical record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecapRecord {
    app_id: AppId,
    values: Vec<(Field, FieldValue)>,
}

impl RecapRecord {
    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Value of `field`, or `None` when the field is not part of the recap.
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.values.iter().map(|(field, _)| *field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(field, value)| (field.as_str().to_owned(), value.to_json(field.kind())))
                .collect(),
        )
    }
}

impl Serialize for RecapRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.as_str(), &value.to_json(field.kind()))?;
        }
        map.end()
    }
}
