//! Collector configuration.
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Var |
//! |---------|-----------------|------------------|
//! | Steam Web API key | `GAMEINSIGHTS_STEAM_API_KEY` | `STEAM_API_KEY` |
//! | Gamalytic API key | `GAMEINSIGHTS_GAMALYTIC_API_KEY` | `GAMALYTIC_API_KEY` |
//! | Store region | `GAMEINSIGHTS_REGION` | - |
//! | Store language | `GAMEINSIGHTS_LANGUAGE` | - |

use std::env;
use std::time::Duration;

use crate::provider_policy::{DEFAULT_QUOTA_LIMIT, DEFAULT_QUOTA_WINDOW};
use crate::throttling::RateLimit;
use crate::ValidationError;

pub const DEFAULT_REGION: &str = "us";
pub const DEFAULT_LANGUAGE: &str = "english";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub region: String,
    pub language: String,
    pub steam_api_key: Option<String>,
    pub gamalytic_api_key: Option<String>,
    /// Aggregate limit around the whole batch; `None` disables it.
    pub aggregate_limit: Option<RateLimit>,
    /// Bound on one adapter call.
    pub fetch_timeout: Duration,
    /// Longest any governor may block before answering `rate_limited`.
    pub max_wait: Duration,
    /// Identifiers collected concurrently.
    pub max_in_flight: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            region: String::from(DEFAULT_REGION),
            language: String::from(DEFAULT_LANGUAGE),
            steam_api_key: None,
            gamalytic_api_key: None,
            aggregate_limit: RateLimit::new(DEFAULT_QUOTA_LIMIT, DEFAULT_QUOTA_WINDOW).ok(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_wait: DEFAULT_QUOTA_WINDOW,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl CollectorConfig {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.steam_api_key = non_empty_var("GAMEINSIGHTS_STEAM_API_KEY")
            .or_else(|| non_empty_var("STEAM_API_KEY"));
        config.gamalytic_api_key = non_empty_var("GAMEINSIGHTS_GAMALYTIC_API_KEY")
            .or_else(|| non_empty_var("GAMALYTIC_API_KEY"));
        if let Some(region) = non_empty_var("GAMEINSIGHTS_REGION") {
            config.region = region;
        }
        if let Some(language) = non_empty_var("GAMEINSIGHTS_LANGUAGE") {
            config.language = language;
        }
        config
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_steam_api_key(mut self, key: impl Into<String>) -> Self {
        self.steam_api_key = Some(key.into());
        self
    }

    pub fn with_gamalytic_api_key(mut self, key: impl Into<String>) -> Self {
        self.gamalytic_api_key = Some(key.into());
        self
    }

    /// Sets the aggregate limit, validating `calls` and `period`.
    pub fn with_aggregate_limit(
        mut self,
        calls: u32,
        period: Duration,
    ) -> Result<Self, ValidationError> {
        self.aggregate_limit = Some(RateLimit::new(calls, period)?);
        Ok(self)
    }

    pub fn without_aggregate_limit(mut self) -> Self {
        self.aggregate_limit = None;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets identifier concurrency; zero is treated as one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
