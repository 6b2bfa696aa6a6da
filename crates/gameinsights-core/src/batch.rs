//! Batch results returned by the collector.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::data_source::{FetchOutcome, SourceErrorKind};
use crate::envelope::{Envelope, EnvelopeError, EnvelopeMeta};
use crate::observe::BatchSummary;
use crate::recap::RecapRecord;
use crate::schema::{CanonicalRecord, SCHEMA_VERSION};
use crate::{AppId, SourceId, UtcDateTime, ValidationError};

/// Compact view of one adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub source: SourceId,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SourceErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl From<&FetchOutcome> for OutcomeSummary {
    fn from(outcome: &FetchOutcome) -> Self {
        Self {
            source: outcome.source(),
            ok: outcome.ok(),
            error: outcome.error().map(|error| error.kind()),
            message: outcome.error().map(|error| error.message().to_owned()),
            duration_ms: outcome.duration().as_millis() as u64,
        }
    }
}

/// One failed source inside a [`FailureDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAttempt {
    pub source: SourceId,
    pub kind: SourceErrorKind,
    pub message: String,
    pub duration_ms: u64,
}

/// Reported for an identifier when no source answered `ok`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDescriptor {
    pub app_id: AppId,
    /// One attempt per selected source, in source order.
    pub attempts: Vec<SourceAttempt>,
}

impl FailureDescriptor {
    /// Builds the descriptor from the failed outcomes of one identifier.
    pub fn from_outcomes(app_id: AppId, outcomes: &[FetchOutcome]) -> Self {
        let mut attempts = outcomes
            .iter()
            .filter_map(|outcome| {
                outcome.error().map(|error| SourceAttempt {
                    source: outcome.source(),
                    kind: error.kind(),
                    message: error.message().to_owned(),
                    duration_ms: outcome.duration().as_millis() as u64,
                })
            })
            .collect::<Vec<_>>();
        attempts.sort_by_key(|attempt| attempt.source);
        Self { app_id, attempts }
    }

    pub fn kinds(&self) -> Vec<(SourceId, SourceErrorKind)> {
        self.attempts
            .iter()
            .map(|attempt| (attempt.source, attempt.kind))
            .collect()
    }
}

/// Result for one requested identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Record {
        record: CanonicalRecord,
        outcomes: Vec<OutcomeSummary>,
    },
    Recap {
        recap: RecapRecord,
        outcomes: Vec<OutcomeSummary>,
    },
    Failed(FailureDescriptor),
    Cancelled {
        app_id: AppId,
    },
}

impl BatchEntry {
    pub fn app_id(&self) -> &AppId {
        match self {
            Self::Record { record, .. } => record.app_id(),
            Self::Recap { recap, .. } => recap.app_id(),
            Self::Failed(failure) => &failure.app_id,
            Self::Cancelled { app_id } => app_id,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Record { .. } | Self::Recap { .. })
    }

    /// Per-source call summaries, in source order.
    pub fn outcomes(&self) -> Vec<OutcomeSummary> {
        match self {
            Self::Record { outcomes, .. } | Self::Recap { outcomes, .. } => outcomes.clone(),
            Self::Failed(failure) => failure
                .attempts
                .iter()
                .map(|attempt| OutcomeSummary {
                    source: attempt.source,
                    ok: false,
                    error: Some(attempt.kind),
                    message: Some(attempt.message.clone()),
                    duration_ms: attempt.duration_ms,
                })
                .collect(),
            Self::Cancelled { .. } => Vec::new(),
        }
    }

    /// Record or recap as JSON; `None` for failures and cancellations.
    pub fn data_json(&self) -> Option<Value> {
        match self {
            Self::Record { record, .. } => Some(record.to_json()),
            Self::Recap { recap, .. } => Some(recap.to_json()),
            Self::Failed(_) | Self::Cancelled { .. } => None,
        }
    }
}

/// Ordered per-identifier results of one `collect` call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    request_id: String,
    entries: Vec<BatchEntry>,
    sources: Vec<SourceId>,
    started_at: UtcDateTime,
    duration: Duration,
}

impl BatchResult {
    pub(crate) fn new(
        request_id: String,
        entries: Vec<BatchEntry>,
        sources: Vec<SourceId>,
        started_at: UtcDateTime,
        duration: Duration,
    ) -> Self {
        Self {
            request_id,
            entries,
            sources,
            started_at,
            duration,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Entries in the caller's identifier order.
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    /// Sources selected for the batch, in source order.
    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Record { record, .. } => Some(record),
            _ => None,
        })
    }

    pub fn recaps(&self) -> impl Iterator<Item = &RecapRecord> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Recap { recap, .. } => Some(recap),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureDescriptor> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Failed(failure) => Some(failure),
            _ => None,
        })
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.entries.len(),
            ..BatchSummary::default()
        };
        for entry in &self.entries {
            match entry {
                BatchEntry::Record { .. } | BatchEntry::Recap { .. } => summary.succeeded += 1,
                BatchEntry::Failed(_) => summary.failed += 1,
                BatchEntry::Cancelled { .. } => summary.cancelled += 1,
            }
        }
        summary
    }

    /// True when any identifier failed or was cancelled.
    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(|entry| !entry.is_success())
    }

    pub fn started_at(&self) -> UtcDateTime {
        self.started_at
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Wraps the batch in the response envelope.
    ///
    /// `data` holds the records (or recaps) of successful identifiers in
    /// input order. Every failed source of a failed identifier becomes an
    /// envelope error; failed sources behind a successful record become
    /// warnings.
    pub fn to_envelope(&self) -> Result<Envelope<Vec<Value>>, ValidationError> {
        let mut meta = EnvelopeMeta::new(
            self.request_id.clone(),
            SCHEMA_VERSION,
            self.sources.clone(),
            self.duration.as_millis() as u64,
        )?
        .with_generated_at(self.started_at);

        let mut errors = Vec::new();
        for entry in &self.entries {
            match entry {
                BatchEntry::Record { outcomes, .. } | BatchEntry::Recap { outcomes, .. } => {
                    for failed in outcomes.iter().filter(|summary| !summary.ok) {
                        let kind = failed.error.map_or("unknown", SourceErrorKind::as_str);
                        meta.push_warning(format!(
                            "{} failed for appid {}: {kind}",
                            failed.source,
                            entry.app_id()
                        ));
                    }
                }
                BatchEntry::Failed(failure) => {
                    for attempt in &failure.attempts {
                        let message = if attempt.message.trim().is_empty() {
                            attempt.kind.as_str().to_owned()
                        } else {
                            attempt.message.clone()
                        };
                        errors.push(
                            EnvelopeError::new(format!("source.{}", attempt.kind.as_str()), message)?
                                .with_source(attempt.source)
                                .with_app_id(failure.app_id.as_str())
                                .with_retryable(attempt.kind.retryable()),
                        );
                    }
                }
                BatchEntry::Cancelled { app_id } => errors.push(
                    EnvelopeError::new("batch.cancelled", "collection was cancelled")?
                        .with_app_id(app_id.as_str()),
                ),
            }
        }

        let data = self
            .entries
            .iter()
            .filter_map(BatchEntry::data_json)
            .collect::<Vec<_>>();
        Envelope::with_errors(meta, data, errors)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data_source::SourceError;
    use crate::Normalizer;

    fn app_id(value: &str) -> AppId {
        AppId::parse(value).expect("valid id")
    }

    fn batch() -> BatchResult {
        let Value::Object(payload) = json!({ "name": "Dota 2" }) else {
            unreachable!()
        };
        let ok_outcomes = vec![
            FetchOutcome::success(SourceId::SteamStore, app_id("570"), payload),
            FetchOutcome::failure(SourceId::ProtonDb, app_id("570"), SourceError::timeout("slow")),
        ];
        let clock = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("clock");
        let record = Normalizer::new().merge(&app_id("570"), &ok_outcomes, clock);
        let failed = vec![
            FetchOutcome::failure(SourceId::ProtonDb, app_id("999999"), SourceError::not_found("none")),
            FetchOutcome::failure(SourceId::SteamStore, app_id("999999"), SourceError::not_found("none")),
        ];

        BatchResult::new(
            String::from("request-0001"),
            vec![
                BatchEntry::Record {
                    record,
                    outcomes: ok_outcomes.iter().map(OutcomeSummary::from).collect(),
                },
                BatchEntry::Failed(FailureDescriptor::from_outcomes(app_id("999999"), &failed)),
                BatchEntry::Cancelled { app_id: app_id("10") },
            ],
            vec![SourceId::SteamStore, SourceId::ProtonDb],
            clock,
            Duration::from_millis(42),
        )
    }

    #[test]
    fn failure_attempts_follow_source_order() {
        let batch = batch();
        let failure = batch.failures().next().expect("one failure");

        assert_eq!(
            failure.kinds(),
            vec![
                (SourceId::SteamStore, SourceErrorKind::NotFound),
                (SourceId::ProtonDb, SourceErrorKind::NotFound)
            ]
        );
    }

    #[test]
    fn summary_counts_each_entry_kind() {
        let summary = batch().summary();

        assert_eq!(
            (summary.total, summary.succeeded, summary.failed, summary.cancelled),
            (3, 1, 1, 1)
        );
        assert!(batch().has_failures());
    }

    #[test]
    fn envelope_carries_records_errors_and_warnings() {
        let envelope = batch().to_envelope().expect("valid envelope");

        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0]["name"], "Dota 2");
        assert_eq!(envelope.errors.len(), 3);
        assert_eq!(envelope.errors[0].code, "source.not_found");
        assert_eq!(envelope.errors[0].app_id.as_deref(), Some("999999"));
        assert_eq!(envelope.errors[2].code, "batch.cancelled");
        assert_eq!(envelope.meta.warnings, vec!["protondb failed for appid 570: timeout"]);
        assert_eq!(envelope.meta.latency_ms, 42);
    }

    #[test]
    fn envelope_data_keeps_schema_field_order() {
        let envelope = batch().to_envelope().expect("valid envelope");

        let keys = envelope.data[0]
            .as_object()
            .expect("record object")
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>();
        let schema = crate::schema::Field::ALL
            .iter()
            .map(|field| field.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, schema);
        assert_eq!(keys[0], "steam_appid");

        let rendered = serde_json::to_string(&envelope).expect("serializes");
        let first = rendered.find("\"steam_appid\"").expect("present");
        let later = rendered.find("\"achievements_count\"").expect("present");
        assert!(first < later);
    }
}
