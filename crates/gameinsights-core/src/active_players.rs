//! Wide monthly active-player table built from canonical records.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::batch::{BatchEntry, BatchResult};
use crate::schema::{CanonicalRecord, Field};
use crate::AppId;

/// Fill value for missing numeric cells unless one is given.
pub const DEFAULT_FILL_MISSING: i64 = -1;

/// One record's row: identity, all-time peak and one cell per month.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePlayerRow {
    pub steam_appid: String,
    pub name: Option<String>,
    pub peak_active_player_all_time: i64,
    /// Average players per month, aligned with [`ActivePlayerTable::months`].
    pub monthly: Vec<f64>,
}

/// Columns `steam_appid, name, peak_active_player_all_time` followed by every
/// month seen in any record, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePlayerTable {
    months: Vec<String>,
    rows: Vec<ActivePlayerRow>,
}

impl ActivePlayerTable {
    pub fn from_records<'a, I>(records: I, fill_missing: i64) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        Self::build(
            records
                .into_iter()
                .map(|record| (record.app_id(), Some(record)))
                .collect(),
            fill_missing,
        )
    }

    /// One row per requested identifier, in batch order. Identifiers without
    /// a record get a row of `fill_missing` cells.
    pub fn from_batch(batch: &BatchResult, fill_missing: i64) -> Self {
        Self::build(
            batch
                .entries()
                .iter()
                .map(|entry| match entry {
                    BatchEntry::Record { record, .. } => (entry.app_id(), Some(record)),
                    _ => (entry.app_id(), None),
                })
                .collect(),
            fill_missing,
        )
    }

    fn build(entries: Vec<(&AppId, Option<&CanonicalRecord>)>, fill_missing: i64) -> Self {
        let series = entries
            .iter()
            .map(|(_, record)| record.map(monthly).unwrap_or_default())
            .collect::<Vec<_>>();
        let months = series
            .iter()
            .flat_map(|by_month| by_month.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        let rows = entries
            .iter()
            .zip(&series)
            .map(|((app_id, record), by_month)| ActivePlayerRow {
                steam_appid: app_id.as_str().to_owned(),
                name: record.and_then(|r| r.get(Field::Name).as_text().map(str::to_owned)),
                peak_active_player_all_time: record
                    .and_then(|r| r.get(Field::PeakActivePlayerAllTime).as_integer())
                    .unwrap_or(fill_missing),
                monthly: months
                    .iter()
                    .map(|month| by_month.get(month).copied().unwrap_or(fill_missing as f64))
                    .collect(),
            })
            .collect();

        Self { months, rows }
    }

    pub fn months(&self) -> &[String] {
        &self.months
    }

    pub fn rows(&self) -> &[ActivePlayerRow] {
        &self.rows
    }

    pub fn headers(&self) -> Vec<String> {
        ["steam_appid", "name", "peak_active_player_all_time"]
            .into_iter()
            .map(str::to_owned)
            .chain(self.months.iter().cloned())
            .collect()
    }

    /// Rows as text cells, aligned with [`headers`](Self::headers).
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                [
                    row.steam_appid.clone(),
                    row.name.clone().unwrap_or_default(),
                    row.peak_active_player_all_time.to_string(),
                ]
                .into_iter()
                .chain(row.monthly.iter().map(f64::to_string))
                .collect()
            })
            .collect()
    }
}

impl Serialize for ActivePlayerTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.rows.iter().map(|row| RowView {
            row,
            months: &self.months,
        }))
    }
}

struct RowView<'a> {
    row: &'a ActivePlayerRow,
    months: &'a [String],
}

impl Serialize for RowView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(3 + self.months.len()))?;
        map.serialize_entry("steam_appid", &self.row.steam_appid)?;
        map.serialize_entry("name", &self.row.name)?;
        map.serialize_entry(
            "peak_active_player_all_time",
            &self.row.peak_active_player_all_time,
        )?;
        for (month, value) in self.months.iter().zip(&self.row.monthly) {
            map.serialize_entry(month, value)?;
        }
        map.end()
    }
}

fn monthly(record: &CanonicalRecord) -> BTreeMap<String, f64> {
    record
        .get(Field::MonthlyActivePlayer)
        .as_series()
        .unwrap_or_default()
        .iter()
        .filter_map(|point| {
            point
                .average_players
                .map(|players| (point.month.clone(), players))
        })
        .collect()
}
