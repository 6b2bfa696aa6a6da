use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::support::{cached_regex, parse_json, send};
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::SourceId;

const DEFAULT_BASE_URL: &str = "https://howlongtobeat.com";

const NEXT_DATA_PATTERN: &str = r#"(?s)<script id="__NEXT_DATA__"[^>]*>(.*?)</script>"#;
static NEXT_DATA: OnceLock<Option<Regex>> = OnceLock::new();

/// HowLongToBeat adapter, queried by game name.
///
/// Obtains a session token, searches for the name, then reads the full game
/// record from the game page's `__NEXT_DATA__` blob, falling back to the
/// search hit when the page cannot be read. Completion times are seconds.
#[derive(Clone)]
pub struct HowLongToBeatAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
}

impl HowLongToBeatAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::HowLongToBeat),
            base_url: String::from(DEFAULT_BASE_URL),
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

    fn browser_request(&self, request: HttpRequest) -> HttpRequest {
        request
            .with_header("accept", "*/*")
            .with_header("referer", format!("{}/", self.base_url))
            .with_header("origin", &self.base_url)
    }

    async fn search_token(&self) -> Result<String, SourceError> {
        let request = self.browser_request(HttpRequest::get(format!(
            "{}/api/finder/init",
            self.base_url
        )));
        let response = send(self.http_client.as_ref(), &self.policy, request).await?;
        let init: TokenResponse = parse_json(&self.policy, &response.body)?;
        init.token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SourceError::parse("howlongtobeat did not return a search token"))
    }

    async fn search(&self, name: &str, token: &str) -> Result<Option<SourcePayload>, SourceError> {
        let request = self
            .browser_request(HttpRequest::post(format!("{}/api/finder", self.base_url)))
            .with_header("x-auth-token", token)
            .with_json(&search_body(name));
        let response = send(self.http_client.as_ref(), &self.policy, request).await?;
        let results: SearchResponse = parse_json(&self.policy, &response.body)?;
        if results.count == Some(0) {
            return Ok(None);
        }
        Ok(results.data.into_iter().next())
    }

    /// Full record from the game page; `None` when the page is unusable.
    async fn game_page(&self, game_id: &Value) -> Option<SourcePayload> {
        let request = self.browser_request(HttpRequest::get(format!(
            "{}/game/{}",
            self.base_url,
            game_id_text(game_id)?
        )));
        let response = send(self.http_client.as_ref(), &self.policy, request)
            .await
            .map_err(|error| debug!(error = %error, "howlongtobeat game page unavailable"))
            .ok()?;

        let pattern = cached_regex(&NEXT_DATA, NEXT_DATA_PATTERN).ok()?;
        let blob = pattern.captures(&response.body)?.get(1)?.as_str();
        let next_data: Value = serde_json::from_str(blob).ok()?;
        next_data
            .pointer("/props/pageProps/game/data/game/0")?
            .as_object()
            .cloned()
    }

    async fn fetch_payload(&self, request: &FetchRequest) -> Result<SourcePayload, SourceError> {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                SourceError::not_found(format!(
                    "howlongtobeat needs a game name and none was resolved for appid {}",
                    request.app_id
                ))
            })?;

        let token = self.search_token().await?;
        let first_hit = self.search(name, &token).await?.ok_or_else(|| {
            SourceError::not_found(format!("howlongtobeat has no game named '{name}'"))
        })?;
        let game_id = first_hit
            .get("game_id")
            .filter(|id| !id.is_null())
            .cloned()
            .ok_or_else(|| SourceError::parse("howlongtobeat search hit has no game_id"))?;

        Ok(self.game_page(&game_id).await.unwrap_or(first_hit))
    }
}

impl DataSource for HowLongToBeatAdapter {
    fn id(&self) -> SourceId {
        SourceId::HowLongToBeat
    }

    fn policy(&self) -> ProviderPolicy {
        self.policy.clone()
    }

    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'a>> {
        Box::pin(FetchOutcome::capture(
            self.id(),
            request.app_id.clone(),
            self.fetch_payload(request),
        ))
    }
}

fn game_id_text(game_id: &Value) -> Option<String> {
    match game_id {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.trim().is_empty() => Some(urlencoding::encode(text.trim()).into_owned()),
        _ => None,
    }
}

fn search_body(name: &str) -> Value {
    json!({
        "searchType": "games",
        "searchTerms": name.split_whitespace().collect::<Vec<_>>(),
        "searchPage": 1,
        "size": 1,
        "searchOptions": {
            "games": {
                "userId": 0,
                "platform": "",
                "sortCategory": "popular",
                "rangeCategory": "main",
                "rangeTime": { "min": 0, "max": 0 },
                "gameplay": { "perspective": "", "flow": "", "genre": "", "difficulty": "" },
                "rangeYear": { "max": "", "min": "" },
                "modifier": ""
            },
            "users": { "sortCategory": "postcount" },
            "lists": { "sortCategory": "follows" },
            "filter": "",
            "sort": 0,
            "randomizer": 0
        },
        "useCache": true
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    data: Vec<SourcePayload>,
}
