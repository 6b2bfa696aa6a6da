//! Source adapter contract and the uniform outcome envelope.
//!
//! Every provider adapter implements [`DataSource`]. A call never fails
//! across the adapter boundary: transport failures, malformed responses,
//! missing credentials and "no data" answers all come back as a
//! [`FetchOutcome`] carrying a [`SourceError`] with a stable
//! [`SourceErrorKind`].
//!
//! # Error kinds
//!
//! | Kind | Code | Retryable |
//! |------|------|-----------|
//! | `TransportError` | `source.transport_error` | yes |
//! | `Timeout` | `source.timeout` | yes |
//! | `RateLimited` | `source.rate_limited` | yes |
//! | `AuthError` | `source.auth_error` | no |
//! | `ParseError` | `source.parse_error` | no |
//! | `NotFound` | `source.not_found` | no |
//! | `ConfigError` | `source.config_error` | no |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::provider_policy::ProviderPolicy;
use crate::{AppId, LookupKind, SourceId, UtcDateTime};

/// Flat provider payload: provider-local keys, provider-native units.
pub type SourcePayload = Map<String, Value>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    TransportError,
    Timeout,
    RateLimited,
    AuthError,
    ParseError,
    NotFound,
    ConfigError,
}

impl SourceErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransportError => "transport_error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::AuthError => "auth_error",
            Self::ParseError => "parse_error",
            Self::NotFound => "not_found",
            Self::ConfigError => "config_error",
        }
    }

    pub const fn retryable(self) -> bool {
        matches!(self, Self::TransportError | Self::Timeout | Self::RateLimited)
    }
}

impl Display for SourceErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured source error captured inside a [`FetchOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.retryable(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::TransportError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::AuthError, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::ParseError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::ConfigError, message)
    }

    /// Classifies a non-success HTTP status from a provider.
    pub fn from_status(source: SourceId, status: u16) -> Self {
        let message = format!("{source} returned status {status}");
        match status {
            401 | 403 => Self::auth(message),
            404 => Self::not_found(message),
            408 | 504 => Self::timeout(message),
            429 => Self::rate_limited(message),
            _ => Self::transport(message),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::TransportError => "source.transport_error",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::AuthError => "source.auth_error",
            SourceErrorKind::ParseError => "source.parse_error",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::ConfigError => "source.config_error",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Input to a single adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub app_id: AppId,
    /// Game name resolved by the app-id providers, used by name-based adapters.
    pub name: Option<String>,
}

impl FetchRequest {
    pub fn new(app_id: AppId) -> Self {
        Self { app_id, name: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Result of one adapter call for one identifier.
///
/// Holds either a payload or an error, never both and never neither.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    source: SourceId,
    identifier: AppId,
    result: Result<SourcePayload, SourceError>,
    started_at: UtcDateTime,
    duration: Duration,
}

impl FetchOutcome {
    pub fn success(source: SourceId, identifier: AppId, payload: SourcePayload) -> Self {
        Self {
            source,
            identifier,
            result: Ok(payload),
            started_at: UtcDateTime::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn failure(source: SourceId, identifier: AppId, error: SourceError) -> Self {
        Self {
            source,
            identifier,
            result: Err(error),
            started_at: UtcDateTime::now(),
            duration: Duration::ZERO,
        }
    }

    /// Runs `work` and records its start time and duration.
    pub async fn capture<F>(source: SourceId, identifier: AppId, work: F) -> Self
    where
        F: Future<Output = Result<SourcePayload, SourceError>>,
    {
        let started_at = UtcDateTime::now();
        let started = Instant::now();
        let result = work.await;
        Self {
            source,
            identifier,
            result,
            started_at,
            duration: started.elapsed(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub const fn source(&self) -> SourceId {
        self.source
    }

    pub fn identifier(&self) -> &AppId {
        &self.identifier
    }

    pub const fn ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn payload(&self) -> Option<&SourcePayload> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.result.as_ref().err()
    }

    pub const fn started_at(&self) -> UtcDateTime {
        self.started_at
    }

    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

/// Source adapter contract.
///
/// Adapter configuration (region, language, credentials) is fixed at
/// construction. The collector applies the adapter's rate limit and timeout
/// around [`fetch`](DataSource::fetch); the adapter performs at most one
/// logical provider operation per call.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across
/// concurrently collected identifiers.
pub trait DataSource: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> SourceId;

    /// Returns which key the provider is queried by.
    fn lookup(&self) -> LookupKind {
        self.id().lookup()
    }

    /// Returns the provider's quota and timeout policy.
    fn policy(&self) -> ProviderPolicy {
        ProviderPolicy::default_for(self.id())
    }

    /// Checks construction-time configuration before any network call.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceErrorKind::ConfigError`] when required credentials
    /// or settings are missing.
    fn validate_config(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Fetches the provider payload for one identifier.
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'a>>;
}
