//! Multi-source collection.
//!
//! [`Collector::collect`] fans every requested identifier out to the selected
//! adapters and merges whatever came back. One failing adapter never aborts
//! the others, and one failing identifier never aborts the batch.
//!
//! Per identifier:
//!
//! 1. acquire one permit from the aggregate governor (when configured);
//! 2. call every app-id adapter concurrently, each behind its own governor
//!    and the fetch timeout;
//! 3. call the name-based adapters with the name merged so far, or record
//!    `not_found` for them when no name is known;
//! 4. merge into a [`CanonicalRecord`], or report a [`FailureDescriptor`]
//!    when no adapter answered `ok`.
//!
//! Identifiers run concurrently up to `max_in_flight`. Results land in the
//! caller's order regardless of completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::adapters::{
    GamalyticAdapter, HowLongToBeatAdapter, ProtonDbAdapter, SteamAchievementsAdapter,
    SteamChartsAdapter, SteamReviewAdapter, SteamSpyAdapter, SteamStoreAdapter,
};
use crate::batch::{BatchEntry, BatchResult, FailureDescriptor, OutcomeSummary};
use crate::config::CollectorConfig;
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::observe::{FetchObserver, TracingObserver};
use crate::provider_policy::ProviderPolicy;
use crate::recap::RecapProjector;
use crate::schema::Field;
use crate::throttling::{GovernorScope, RateGovernor};
use crate::{AppId, LookupKind, Normalizer, SourceId, UtcDateTime, ValidationError};

/// Which adapters a batch calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceSelection {
    #[default]
    All,
    Only(BTreeSet<SourceId>),
}

impl SourceSelection {
    /// A non-empty subset of sources.
    pub fn only<I>(sources: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = SourceId>,
    {
        let sources = sources.into_iter().collect::<BTreeSet<_>>();
        if sources.is_empty() {
            return Err(ValidationError::EmptySourceChain);
        }
        Ok(Self::Only(sources))
    }

    /// Parses source names, case-insensitively.
    pub fn parse<I, S>(names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sources = names
            .into_iter()
            .map(|name| name.as_ref().parse::<SourceId>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::only(sources)
    }

    pub fn includes(&self, source: SourceId) -> bool {
        match self {
            Self::All => true,
            Self::Only(sources) => sources.contains(&source),
        }
    }
}

/// Input of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectRequest {
    pub app_ids: Vec<AppId>,
    pub sources: SourceSelection,
    pub recap: bool,
}

impl CollectRequest {
    pub fn new(app_ids: Vec<AppId>) -> Self {
        Self {
            app_ids,
            sources: SourceSelection::All,
            recap: false,
        }
    }

    /// Validates raw identifiers. Duplicates are kept.
    pub fn parse<I, S>(app_ids: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let app_ids = app_ids
            .into_iter()
            .map(|id| AppId::parse(id.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(app_ids))
    }

    pub fn with_sources(mut self, sources: SourceSelection) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_recap(mut self, recap: bool) -> Self {
        self.recap = recap;
        self
    }
}

/// Caller-held cancellation handle for a running batch.
///
/// Clones share one flag. Cancelling abandons in-flight adapter calls;
/// identifiers already merged keep their result, the rest are reported as
/// [`BatchEntry::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so the wait cannot close early.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
enum Clock {
    System,
    Fixed(UtcDateTime),
}

impl Clock {
    fn now(self) -> UtcDateTime {
        match self {
            Self::System => UtcDateTime::now(),
            Self::Fixed(at) => at,
        }
    }
}

struct RegisteredSource {
    source: Arc<dyn DataSource>,
    governor: RateGovernor,
    /// Set when `validate_config` failed at build time.
    disabled: Option<SourceError>,
}

impl RegisteredSource {
    fn id(&self) -> SourceId {
        self.source.id()
    }
}

struct CollectorInner {
    sources: Vec<Arc<RegisteredSource>>,
    aggregate: Option<RateGovernor>,
    normalizer: Normalizer,
    recap: RecapProjector,
    observer: Arc<dyn FetchObserver>,
    fetch_timeout: Duration,
    max_in_flight: usize,
    clock: Clock,
}

/// Orchestrates adapters, governors and the normalizer for a batch.
///
/// Cheap to clone; clones share adapters and governors.
#[derive(Clone)]
pub struct Collector {
    inner: Arc<CollectorInner>,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("sources", &self.sources())
            .field("fetch_timeout", &self.inner.fetch_timeout)
            .field("max_in_flight", &self.inner.max_in_flight)
            .finish()
    }
}

impl Collector {
    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::new()
    }

    /// Collector with every production adapter over a real HTTP client.
    pub fn from_config(config: CollectorConfig) -> Result<Self, ValidationError> {
        CollectorBuilder::new()
            .with_config(config)
            .with_default_sources(Arc::new(ReqwestHttpClient::new()))
            .build()
    }

    /// Registered sources, in source order.
    pub fn sources(&self) -> Vec<SourceId> {
        self.inner.sources.iter().map(|s| s.id()).collect()
    }

    /// Quota policy of each registered source, in source order.
    pub fn policies(&self) -> Vec<ProviderPolicy> {
        self.inner.sources.iter().map(|s| s.source.policy()).collect()
    }

    /// Sources disabled by a configuration error, with the reason.
    pub fn disabled_sources(&self) -> Vec<(SourceId, SourceError)> {
        self.inner
            .sources
            .iter()
            .filter_map(|s| s.disabled.clone().map(|error| (s.id(), error)))
            .collect()
    }

    pub async fn collect(&self, request: &CollectRequest) -> BatchResult {
        self.collect_with_cancel(request, CancelSignal::new()).await
    }

    pub async fn collect_with_cancel(
        &self,
        request: &CollectRequest,
        cancel: CancelSignal,
    ) -> BatchResult {
        let started = Instant::now();
        let started_at = UtcDateTime::now();
        let collected_at = self.inner.clock.now();
        let request_id = uuid::Uuid::new_v4().to_string();
        self.inner.observer.on_batch_start(request.app_ids.len());

        let selected = self
            .inner
            .sources
            .iter()
            .filter(|registered| request.sources.includes(registered.id()))
            .cloned()
            .collect::<Vec<_>>();
        let selected = Arc::new(selected);
        let permits = Arc::new(Semaphore::new(self.inner.max_in_flight.max(1)));

        let mut tasks = JoinSet::new();
        for (index, app_id) in request.app_ids.iter().cloned().enumerate() {
            let inner = Arc::clone(&self.inner);
            let selected = Arc::clone(&selected);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let recap = request.recap;

            tasks.spawn(async move {
                let entry = tokio::select! {
                    biased;
                    () = cancel.cancelled() => BatchEntry::Cancelled { app_id: app_id.clone() },
                    entry = async {
                        // The semaphore is never closed.
                        let _permit = Arc::clone(&permits).acquire_owned().await.ok();
                        Arc::clone(&inner)
                            .collect_one(app_id.clone(), &selected, recap, collected_at)
                            .await
                    } => entry,
                };
                (index, entry)
            });
        }

        let mut slots = vec![None; request.app_ids.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(error) => warn!(error = %error, "collection task ended abnormally"),
            }
        }

        let entries = slots
            .into_iter()
            .zip(&request.app_ids)
            .map(|(slot, app_id)| {
                slot.unwrap_or_else(|| BatchEntry::Cancelled {
                    app_id: app_id.clone(),
                })
            })
            .collect::<Vec<_>>();

        let batch = BatchResult::new(
            request_id,
            entries,
            selected.iter().map(|s| s.id()).collect(),
            started_at,
            started.elapsed(),
        );
        self.inner
            .observer
            .on_batch_complete(&batch.summary(), batch.duration());
        batch
    }
}

impl CollectorInner {
    async fn collect_one(
        self: Arc<Self>,
        app_id: AppId,
        selected: &[Arc<RegisteredSource>],
        recap: bool,
        collected_at: UtcDateTime,
    ) -> BatchEntry {
        if let Some(aggregate) = &self.aggregate {
            if let Err(exceeded) = aggregate.acquire().await {
                warn!(app_id = %app_id, error = %exceeded, "aggregate rate limit refused identifier");
                let outcomes = selected
                    .iter()
                    .map(|registered| {
                        FetchOutcome::failure(
                            registered.id(),
                            app_id.clone(),
                            SourceError::rate_limited(exceeded.to_string()),
                        )
                    })
                    .collect::<Vec<_>>();
                return self.finish(app_id, outcomes, recap, collected_at);
            }
        }

        let (by_name, by_app_id): (Vec<_>, Vec<_>) = selected
            .iter()
            .cloned()
            .partition(|registered| registered.source.lookup() == LookupKind::Name);

        let request = FetchRequest::new(app_id.clone());
        let mut outcomes = Arc::clone(&self).fetch_all(&by_app_id, &request).await;

        if !by_name.is_empty() {
            let name = self
                .normalizer
                .merge(&app_id, &outcomes, collected_at)
                .get(Field::Name)
                .as_text()
                .map(str::to_owned);
            match name {
                Some(name) => {
                    let request = request.with_name(name);
                    outcomes.extend(Arc::clone(&self).fetch_all(&by_name, &request).await);
                }
                None => outcomes.extend(by_name.iter().map(|registered| {
                    let error = registered.disabled.clone().unwrap_or_else(|| {
                        SourceError::not_found(format!(
                            "{} is queried by name and no name was resolved for appid {app_id}",
                            registered.id()
                        ))
                    });
                    self.report_uncalled(FetchOutcome::failure(
                        registered.id(),
                        app_id.clone(),
                        error,
                    ))
                })),
            }
        }

        self.finish(app_id, outcomes, recap, collected_at)
    }

    /// Calls `sources` concurrently; outcomes come back in source order.
    async fn fetch_all(
        self: Arc<Self>,
        sources: &[Arc<RegisteredSource>],
        request: &FetchRequest,
    ) -> Vec<FetchOutcome> {
        let mut calls = JoinSet::new();
        for registered in sources {
            let inner = Arc::clone(&self);
            let registered = Arc::clone(registered);
            let request = request.clone();
            calls.spawn(async move { inner.call(&registered, &request).await });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok(outcome) => {
                    outcomes.insert(outcome.source(), outcome);
                }
                Err(error) => warn!(error = %error, "adapter task ended abnormally"),
            }
        }

        for registered in sources {
            outcomes.entry(registered.id()).or_insert_with(|| {
                FetchOutcome::failure(
                    registered.id(),
                    request.app_id.clone(),
                    SourceError::transport("adapter call ended without an outcome"),
                )
            });
        }
        outcomes.into_values().collect()
    }

    async fn call(&self, registered: &RegisteredSource, request: &FetchRequest) -> FetchOutcome {
        let id = registered.id();
        if let Some(error) = &registered.disabled {
            return self.report_uncalled(FetchOutcome::failure(
                id,
                request.app_id.clone(),
                error.clone(),
            ));
        }

        self.observer.on_fetch_start(id, &request.app_id);
        let started = Instant::now();
        let outcome = match registered.governor.acquire().await {
            Err(exceeded) => FetchOutcome::failure(
                id,
                request.app_id.clone(),
                SourceError::rate_limited(exceeded.to_string()),
            )
            .with_duration(started.elapsed()),
            Ok(permit) => {
                if !permit.waited.is_zero() {
                    debug!(source = %id, waited_ms = permit.waited.as_millis() as u64, "rate governor delayed call");
                }
                match tokio::time::timeout(self.fetch_timeout, registered.source.fetch(request)).await {
                    Ok(outcome) => outcome,
                    Err(_) => FetchOutcome::failure(
                        id,
                        request.app_id.clone(),
                        SourceError::timeout(format!(
                            "{id} did not answer within {} ms",
                            self.fetch_timeout.as_millis()
                        )),
                    )
                    .with_duration(started.elapsed()),
                }
            }
        };
        self.observer.on_fetch_complete(&outcome);
        outcome
    }

    /// Reports an outcome settled without calling the adapter. Observers
    /// still see a start/complete pair.
    fn report_uncalled(&self, outcome: FetchOutcome) -> FetchOutcome {
        self.observer.on_fetch_start(outcome.source(), outcome.identifier());
        self.observer.on_fetch_complete(&outcome);
        outcome
    }

    fn finish(
        &self,
        app_id: AppId,
        outcomes: Vec<FetchOutcome>,
        recap: bool,
        collected_at: UtcDateTime,
    ) -> BatchEntry {
        if !outcomes.iter().any(FetchOutcome::ok) {
            return BatchEntry::Failed(FailureDescriptor::from_outcomes(app_id, &outcomes));
        }

        let record = self.normalizer.merge(&app_id, &outcomes, collected_at);
        let mut summaries = outcomes.iter().map(OutcomeSummary::from).collect::<Vec<_>>();
        summaries.sort_by_key(|summary| summary.source);

        if recap {
            BatchEntry::Recap {
                recap: self.recap.project(&record),
                outcomes: summaries,
            }
        } else {
            BatchEntry::Record {
                record,
                outcomes: summaries,
            }
        }
    }
}

/// Assembles a [`Collector`] from a config, adapters and governors.
pub struct CollectorBuilder {
    config: CollectorConfig,
    sources: BTreeMap<SourceId, Arc<dyn DataSource>>,
    governors: BTreeMap<SourceId, RateGovernor>,
    aggregate: Option<RateGovernor>,
    recap: Option<RecapProjector>,
    observer: Arc<dyn FetchObserver>,
    clock: Clock,
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorBuilder {
    pub fn new() -> Self {
        Self {
            config: CollectorConfig::default(),
            sources: BTreeMap::new(),
            governors: BTreeMap::new(),
            aggregate: None,
            recap: None,
            observer: Arc::new(TracingObserver),
            clock: Clock::System,
        }
    }

    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers all eight production adapters over `http_client`.
    pub fn with_default_sources(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        let config = &self.config;
        let adapters: [Arc<dyn DataSource>; 8] = [
            Arc::new(SteamStoreAdapter::new(
                Arc::clone(&http_client),
                config.region.clone(),
                config.language.clone(),
            )),
            Arc::new(GamalyticAdapter::new(
                Arc::clone(&http_client),
                config.gamalytic_api_key.clone(),
            )),
            Arc::new(SteamSpyAdapter::new(Arc::clone(&http_client))),
            Arc::new(SteamChartsAdapter::new(Arc::clone(&http_client))),
            Arc::new(SteamReviewAdapter::new(Arc::clone(&http_client))),
            Arc::new(SteamAchievementsAdapter::new(
                Arc::clone(&http_client),
                config.steam_api_key.clone(),
                config.language.clone(),
            )),
            Arc::new(ProtonDbAdapter::new(Arc::clone(&http_client))),
            Arc::new(HowLongToBeatAdapter::new(http_client)),
        ];
        for adapter in adapters {
            self.sources.insert(adapter.id(), adapter);
        }
        self
    }

    /// Registers `source`, replacing any adapter with the same id.
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.sources.insert(source.id(), source);
        self
    }

    /// Injects a governor; its scope decides whether it is per-source or aggregate.
    pub fn with_governor(mut self, governor: RateGovernor) -> Self {
        match governor.scope() {
            GovernorScope::Source(source) => {
                self.governors.insert(source, governor);
            }
            GovernorScope::Aggregate => self.aggregate = Some(governor),
        }
        self
    }

    pub fn with_recap(mut self, recap: RecapProjector) -> Self {
        self.recap = Some(recap);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Fixes the collection clock used for derived fields.
    pub fn with_clock(mut self, at: UtcDateTime) -> Self {
        self.clock = Clock::Fixed(at);
        self
    }

    pub fn build(self) -> Result<Collector, ValidationError> {
        let max_wait = self.config.max_wait;
        let mut governors = self.governors;

        let mut sources = Vec::with_capacity(self.sources.len());
        for (id, source) in self.sources {
            let governor = match governors.remove(&id) {
                Some(governor) => governor,
                None => {
                    let policy = source.policy();
                    let capped = policy.max_wait.min(max_wait);
                    RateGovernor::from_policy(&policy.with_max_wait(capped))?
                }
            };
            let disabled = source.validate_config().err();
            if let Some(error) = &disabled {
                warn!(source = %id, error = %error, "adapter disabled by configuration");
            }
            sources.push(Arc::new(RegisteredSource {
                source,
                governor,
                disabled,
            }));
        }

        let aggregate = match self.aggregate {
            Some(governor) => Some(governor),
            None => self
                .config
                .aggregate_limit
                .map(|limit| RateGovernor::new(GovernorScope::Aggregate, limit, max_wait)),
        };

        let recap = match self.recap {
            Some(recap) => recap,
            None => RecapProjector::new()?,
        };

        Ok(Collector {
            inner: Arc::new(CollectorInner {
                sources,
                aggregate,
                normalizer: Normalizer::new(),
                recap,
                observer: self.observer,
                fetch_timeout: self.config.fetch_timeout,
                max_in_flight: self.config.max_in_flight.max(1),
                clock: self.clock,
            }),
        })
    }
}
