//! Steam user profile collection.

use std::sync::Arc;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::adapters::{SteamUserAdapter, UserProfile};
use crate::config::CollectorConfig;
use crate::data_source::SourceError;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::throttling::RateGovernor;
use crate::{SteamId, ValidationError};

/// Result for one requested account.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEntry {
    Profile(UserProfile),
    Failed { steamid: SteamId, error: SourceError },
}

impl UserEntry {
    pub fn steamid(&self) -> &SteamId {
        match self {
            Self::Profile(profile) => &profile.steamid,
            Self::Failed { steamid, .. } => steamid,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::Profile(profile) => Some(profile),
            Self::Failed { .. } => None,
        }
    }
}

/// Profiles serialize as themselves; failures as `{steamid, error}`.
impl Serialize for UserEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Profile(profile) => profile.serialize(serializer),
            Self::Failed { steamid, error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("steamid", steamid)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Fetches profiles one account at a time under the Steam user governor.
#[derive(Clone)]
pub struct UserCollector {
    adapter: Arc<SteamUserAdapter>,
    governor: RateGovernor,
    fetch_timeout: Duration,
    disabled: Option<SourceError>,
}

impl UserCollector {
    pub fn new(adapter: SteamUserAdapter, config: &CollectorConfig) -> Result<Self, ValidationError> {
        let policy = adapter.policy();
        let capped = policy.max_wait.min(config.max_wait);
        let disabled = adapter.validate_config().err();
        if let Some(error) = &disabled {
            warn!(error = %error, "steamuser disabled by configuration");
        }
        Ok(Self {
            governor: RateGovernor::from_policy(&policy.with_max_wait(capped))?,
            adapter: Arc::new(adapter),
            fetch_timeout: config.fetch_timeout,
            disabled,
        })
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self, ValidationError> {
        let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        Self::new(
            SteamUserAdapter::new(http_client, config.steam_api_key.clone()),
            config,
        )
    }

    pub fn with_governor(mut self, governor: RateGovernor) -> Self {
        self.governor = governor;
        self
    }

    /// One entry per requested id, in request order. A failed account never
    /// stops the others.
    pub async fn collect(&self, steam_ids: &[SteamId], include_free_games: bool) -> Vec<UserEntry> {
        let total = steam_ids.len();
        let mut entries = Vec::with_capacity(total);
        for (index, steam_id) in steam_ids.iter().enumerate() {
            info!(steamid = %steam_id, "fetching user {} of {total}", index + 1);
            let entry = match self.fetch(steam_id, include_free_games).await {
                Ok(profile) => UserEntry::Profile(profile),
                Err(error) => {
                    warn!(steamid = %steam_id, code = error.code(), error = error.message(), "user fetch failed");
                    UserEntry::Failed {
                        steamid: steam_id.clone(),
                        error,
                    }
                }
            };
            entries.push(entry);
        }
        entries
    }

    async fn fetch(&self, steam_id: &SteamId, include_free_games: bool) -> Result<UserProfile, SourceError> {
        if let Some(error) = &self.disabled {
            return Err(error.clone());
        }
        self.governor
            .acquire()
            .await
            .map_err(|exceeded| SourceError::rate_limited(exceeded.to_string()))?;
        tokio::time::timeout(
            self.fetch_timeout,
            self.adapter.fetch_user(steam_id, include_free_games),
        )
        .await
        .map_err(|_| {
            SourceError::timeout(format!(
                "steamuser did not answer within {} ms",
                self.fetch_timeout.as_millis()
            ))
        })?
    }
}
