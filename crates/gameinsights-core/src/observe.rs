//! Observability hooks called by the collector.
//!
//! The core owns no sink: [`TracingObserver`] forwards events to `tracing`,
//! and callers may plug in their own [`FetchObserver`].

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::data_source::FetchOutcome;
use crate::{AppId, SourceId};

/// Counts reported when a batch finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub trait FetchObserver: Send + Sync {
    fn on_fetch_start(&self, _source: SourceId, _app_id: &AppId) {}

    fn on_fetch_complete(&self, _outcome: &FetchOutcome) {}

    fn on_batch_start(&self, _size: usize) {}

    fn on_batch_complete(&self, _summary: &BatchSummary, _duration: Duration) {}
}

/// Forwards collector events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FetchObserver for TracingObserver {
    fn on_fetch_start(&self, source: SourceId, app_id: &AppId) {
        debug!(source = %source, app_id = %app_id, "fetch started");
    }

    fn on_fetch_complete(&self, outcome: &FetchOutcome) {
        let duration_ms = outcome.duration().as_millis() as u64;
        match outcome.error() {
            None => debug!(
                source = %outcome.source(),
                app_id = %outcome.identifier(),
                ok = true,
                duration_ms,
                "fetch completed"
            ),
            Some(error) => warn!(
                source = %outcome.source(),
                app_id = %outcome.identifier(),
                ok = false,
                duration_ms,
                code = error.code(),
                error = error.message(),
                "fetch failed"
            ),
        }
    }

    fn on_batch_start(&self, size: usize) {
        info!(size, "collecting data for {size} appid(s)");
    }

    fn on_batch_complete(&self, summary: &BatchSummary, duration: Duration) {
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            duration_ms = duration.as_millis() as u64,
            "batch completed"
        );
    }
}
