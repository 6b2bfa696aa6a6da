//! # GameInsights Core
//!
//! Multi-source collection and merge engine for Steam game data.
//!
//! ## Overview
//!
//! This crate fans one Steam app id out to several independent providers,
//! tolerates any of them failing, and merges what came back into one
//! normalized record:
//!
//! - **Source adapters** for eight providers behind one [`DataSource`] contract
//! - **Rate governors** per provider and around the whole batch
//! - **Collector** with ordered, cancellable, partially-failing batches
//! - **Normalizer** with a fixed, versioned canonical schema and per-field precedence
//! - **Recap projector** for a fixed summary subset
//! - **Response envelope** with metadata and structured errors
//! - **Review export** and **user profiles** beside the game merge
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`active_players`] | Wide monthly active-player table |
//! | [`adapters`] | Provider adapters (Steam Store, Gamalytic, SteamSpy, SteamCharts, Steam reviews, Steam achievements, ProtonDB, HowLongToBeat, Steam users) |
//! | [`batch`] | Batch results, failure descriptors |
//! | [`collector`] | Batch orchestration and cancellation |
//! | [`config`] | Collector configuration and environment overlay |
//! | [`data_source`] | Adapter trait and the fetch outcome envelope |
//! | [`domain`] | App ids, timestamps and date parsing |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalize`] | Canonical mapping, precedence and unit conversion |
//! | [`observe`] | Fetch and batch observability hooks |
//! | [`provider_policy`] | Per-provider quota and timeout policy |
//! | [`recap`] | Recap key set and projection |
//! | [`retry`] | Transport retries with backoff |
//! | [`reviews`] | Paged review export for one app id |
//! | [`schema`] | Canonical fields, kinds and values |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Sliding-window rate governor |
//! | [`users`] | Steam user profiles and game libraries |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gameinsights_core::{CollectRequest, Collector, CollectorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collector = Collector::from_config(CollectorConfig::from_env())?;
//!
//!     let batch = collector.collect(&CollectRequest::parse(["570"])?).await;
//!     for record in batch.records() {
//!         println!("{}", serde_json::to_string_pretty(record)?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Collector     │────▶│ Rate Governors   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ + retry          │
//! └────────┬────────┘     └──────────────────┘
//!          │ FetchOutcome
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Normalizer     │────▶│ Recap Projector  │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapters never fail across their boundary; every failure is a
//! [`SourceError`] inside a [`FetchOutcome`]:
//!
//! ```rust
//! use gameinsights_core::{SourceError, SourceErrorKind};
//!
//! fn describe(error: &SourceError) -> &'static str {
//!     match error.kind() {
//!         SourceErrorKind::RateLimited | SourceErrorKind::Timeout => "try again later",
//!         SourceErrorKind::NotFound => "provider has no data",
//!         SourceErrorKind::ConfigError | SourceErrorKind::AuthError => "check credentials",
//!         _ => "provider failed",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys come from configuration or environment variables and are never logged

pub mod active_players;
pub mod adapters;
pub mod batch;
pub mod collector;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod observe;
pub mod provider_policy;
pub mod recap;
pub mod retry;
pub mod reviews;
pub mod schema;
pub mod source;
pub mod throttling;
pub mod users;

// Active-player table
pub use active_players::{ActivePlayerRow, ActivePlayerTable, DEFAULT_FILL_MISSING};

// Adapter implementations
pub use adapters::{
    GamalyticAdapter, HowLongToBeatAdapter, OwnedGame, ProtonDbAdapter, RecentGame, StaticSource,
    SteamAchievementsAdapter, SteamChartsAdapter, SteamReviewAdapter, SteamSpyAdapter,
    SteamStoreAdapter, SteamUserAdapter, UserProfile,
};

// Batch results
pub use batch::{BatchEntry, BatchResult, FailureDescriptor, OutcomeSummary, SourceAttempt};

// Collection
pub use collector::{CancelSignal, CollectRequest, Collector, CollectorBuilder, SourceSelection};
pub use config::CollectorConfig;

// Data source trait and types
pub use data_source::{
    DataSource, FetchOutcome, FetchRequest, SourceError, SourceErrorKind, SourcePayload,
};

// Domain types
pub use domain::{
    date_from_epoch, format_calendar_date, parse_calendar_date, AppId, SteamId, UtcDateTime,
};

// Envelope types
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient, StaticHttpClient,
};

// Normalization
pub use normalize::{Binding, Conversion, Normalizer};

// Observability
pub use observe::{BatchSummary, FetchObserver, TracingObserver};

// Provider policies
pub use provider_policy::ProviderPolicy;

// Recap
pub use recap::{RecapProjector, RecapRecord, DEFAULT_RECAP_KEYS};

// Review export
pub use reviews::{ReviewExport, ReviewExporter, ReviewPage, ReviewQuery, FIRST_PAGE_CURSOR};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Canonical schema
pub use schema::{CanonicalRecord, Field, FieldKind, FieldValue, SeriesPoint, SCHEMA_VERSION};

// Source identifiers
pub use source::{Credentials, LookupKind, SourceId};

// Throttling
pub use throttling::{GovernorScope, Permit, RateGovernor, RateLimit, RateLimitExceeded};

// User profiles
pub use users::{UserCollector, UserEntry};
