use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::provider_policy::ProviderPolicy;
use crate::SourceId;

type Scripted = Result<SourcePayload, SourceError>;

/// Scripted in-memory adapter for offline collection.
///
/// Answers per identifier from a fixed script, optionally after a delay.
/// Identifiers without a script entry get the fallback answer, or
/// `not_found` when none is set.
#[derive(Debug)]
pub struct StaticSource {
    id: SourceId,
    policy: ProviderPolicy,
    script: HashMap<String, Scripted>,
    fallback: Option<Scripted>,
    delay: Duration,
    config_error: Option<SourceError>,
    calls: AtomicUsize,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            policy: ProviderPolicy::default_for(id),
            script: HashMap::new(),
            fallback: None,
            delay: Duration::ZERO,
            config_error: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers `app_id` with `payload`; a non-object payload answers `parse_error`.
    pub fn respond(mut self, app_id: &str, payload: Value) -> Self {
        self.script.insert(app_id.to_owned(), into_payload(self.id, payload));
        self
    }

    pub fn fail(mut self, app_id: &str, error: SourceError) -> Self {
        self.script.insert(app_id.to_owned(), Err(error));
        self
    }

    pub fn respond_all(mut self, payload: Value) -> Self {
        self.fallback = Some(into_payload(self.id, payload));
        self
    }

    pub fn fail_all(mut self, error: SourceError) -> Self {
        self.fallback = Some(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_policy(mut self, policy: ProviderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Makes [`DataSource::validate_config`] fail with `error`.
    pub fn with_config_error(mut self, error: SourceError) -> Self {
        self.config_error = Some(error);
        self
    }

    /// Number of `fetch` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn answer(&self, request: &FetchRequest) -> Scripted {
        self.script
            .get(request.app_id.as_str())
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or_else(|| {
                Err(SourceError::not_found(format!(
                    "{} has no data for appid {}",
                    self.id, request.app_id
                )))
            })
    }
}

impl DataSource for StaticSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn policy(&self) -> ProviderPolicy {
        self.policy.clone()
    }

    fn validate_config(&self) -> Result<(), SourceError> {
        match &self.config_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        Box::pin(FetchOutcome::capture(self.id, request.app_id.clone(), async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer(request)
        }))
    }
}

fn into_payload(id: SourceId, payload: Value) -> Scripted {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(SourceError::parse(format!(
            "{id} scripted payload is not an object: {other}"
        ))),
    }
}
