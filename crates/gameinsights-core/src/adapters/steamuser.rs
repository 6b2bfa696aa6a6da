use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::support::{parse_json, send};
use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::{SourceId, SteamId};

const DEFAULT_BASE_URL: &str = "https://api.steampowered.com";

/// `communityvisibilitystate` of a profile whose game library is readable.
const PUBLIC_PROFILE: i64 = 3;

/// Game in a user's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedGame {
    pub appid: u64,
    /// Minutes.
    #[serde(default)]
    pub playtime_forever: u64,
}

/// Game played in the last two weeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentGame {
    pub appid: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Minutes.
    #[serde(default)]
    pub playtime_2weeks: u64,
    #[serde(default)]
    pub playtime_forever: u64,
}

/// Public profile data of one Steam account.
///
/// Private profiles keep their summary; the library fields stay empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub steamid: SteamId,
    pub persona_name: Option<String>,
    pub profile_url: Option<String>,
    pub real_name: Option<String>,
    pub country_code: Option<String>,
    pub is_public: bool,
    /// Unix seconds.
    pub time_created: Option<i64>,
    pub last_logoff: Option<i64>,
    pub game_count: u64,
    pub total_playtime_minutes: u64,
    pub owned_games: Vec<OwnedGame>,
    pub recently_played: Vec<RecentGame>,
}

/// Steam Web API user adapter (player summary, owned and recent games).
///
/// Requires a Steam Web API key.
#[derive(Clone)]
pub struct SteamUserAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
    api_key: Option<String>,
}

impl SteamUserAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::SteamUser),
            base_url: String::from(DEFAULT_BASE_URL),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_policy(mut self, policy: ProviderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ProviderPolicy {
        self.policy.clone()
    }

    pub fn validate_config(&self) -> Result<(), SourceError> {
        self.api_key().map(|_| ())
    }

    fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SourceError::config("steamuser requires a Steam Web API key"))
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let mut request = HttpRequest::get(format!("{}/{path}", self.base_url))
            .with_query("key", self.api_key()?);
        for (name, value) in query {
            request = request.with_query(*name, *value);
        }
        let response = send(self.http_client.as_ref(), &self.policy, request).await?;
        parse_json(&self.policy, &response.body)
    }

    pub async fn fetch_user(
        &self,
        steam_id: &SteamId,
        include_free_games: bool,
    ) -> Result<UserProfile, SourceError> {
        let id = steam_id.as_str();
        let summaries: ApiResponse<SummaryResponse> = self
            .call("ISteamUser/GetPlayerSummaries/v2/", &[("steamids", id)])
            .await?;
        let player = summaries
            .response
            .players
            .into_iter()
            .find(|player| player.steamid.as_deref() == Some(id))
            .ok_or_else(|| SourceError::not_found(format!("steamuser has no profile {id}")))?;

        let is_public = player.communityvisibilitystate == Some(PUBLIC_PROFILE);
        let mut profile = UserProfile {
            steamid: steam_id.clone(),
            persona_name: player.personaname,
            profile_url: player.profileurl,
            real_name: player.realname,
            country_code: player.loccountrycode,
            is_public,
            time_created: player.timecreated,
            last_logoff: player.lastlogoff,
            game_count: 0,
            total_playtime_minutes: 0,
            owned_games: Vec::new(),
            recently_played: Vec::new(),
        };
        if !is_public {
            return Ok(profile);
        }

        let include_free = if include_free_games { "1" } else { "0" };
        let owned: ApiResponse<GamesResponse<OwnedGame>> = self
            .call(
                "IPlayerService/GetOwnedGames/v1/",
                &[("steamid", id), ("include_played_free_games", include_free)],
            )
            .await?;
        let recent: ApiResponse<GamesResponse<RecentGame>> = self
            .call("IPlayerService/GetRecentlyPlayedGames/v1/", &[("steamid", id)])
            .await?;

        profile.owned_games = owned.response.games;
        profile.game_count = owned
            .response
            .game_count
            .and_then(|count| count.as_u64())
            .unwrap_or(profile.owned_games.len() as u64);
        profile.total_playtime_minutes = profile
            .owned_games
            .iter()
            .map(|game| game.playtime_forever)
            .sum();
        profile.recently_played = recent.response.games;
        Ok(profile)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    response: T,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    players: Vec<Player>,
}

#[derive(Debug, Deserialize)]
struct Player {
    steamid: Option<String>,
    communityvisibilitystate: Option<i64>,
    personaname: Option<String>,
    profileurl: Option<String>,
    realname: Option<String>,
    loccountrycode: Option<String>,
    timecreated: Option<i64>,
    lastlogoff: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "G: Deserialize<'de>"))]
struct GamesResponse<G> {
    #[serde(default)]
    game_count: Option<Value>,
    #[serde(default = "Vec::new")]
    games: Vec<G>,
}
