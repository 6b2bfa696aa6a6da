use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::support::{parse_json, payload, send};
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::SourceId;

const DEFAULT_BASE_URL: &str = "https://api.steampowered.com";

/// Steam Web API achievements adapter.
///
/// Joins global unlock percentages with the game's achievement schema.
/// Requires a Steam Web API key.
#[derive(Clone)]
pub struct SteamAchievementsAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
    api_key: Option<String>,
    language: String,
}

impl SteamAchievementsAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: Option<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::SteamAchievements),
            base_url: String::from(DEFAULT_BASE_URL),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            language: language.into(),
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

    fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key.as_deref().ok_or_else(|| {
            SourceError::config("steamachievements requires a Steam Web API key")
        })
    }

    async fn fetch_payload(&self, request: &FetchRequest) -> Result<SourcePayload, SourceError> {
        let api_key = self.api_key()?;
        let app_id = request.app_id.as_str();

        let percentages_request = HttpRequest::get(format!(
            "{}/ISteamUserStats/GetGlobalAchievementPercentagesForApp/v2/",
            self.base_url
        ))
        .with_query("gameid", app_id);
        let response = send(self.http_client.as_ref(), &self.policy, percentages_request).await?;
        let percentages: PercentagesResponse = parse_json(&self.policy, &response.body)?;

        let unlocked = percentages
            .achievementpercentages
            .map(|p| p.achievements)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let name = entry.get("name")?.as_str()?.to_owned();
                let percent = percent_value(entry.get("percent")?)?;
                Some((name, percent))
            })
            .collect::<Vec<_>>();
        if unlocked.is_empty() {
            return Err(SourceError::not_found(format!(
                "steamachievements has no achievements for appid {app_id}"
            )));
        }

        let schema_request = HttpRequest::get(format!(
            "{}/ISteamUserStats/GetSchemaForGame/v2/",
            self.base_url
        ))
        .with_query("key", api_key)
        .with_query("appid", app_id)
        .with_query("l", &self.language);
        let response = send(self.http_client.as_ref(), &self.policy, schema_request).await?;
        let schema: SchemaResponse = parse_json(&self.policy, &response.body)?;
        let details = schema
            .game
            .and_then(|game| game.available_game_stats)
            .map(|stats| stats.achievements)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| Some((entry.get("name")?.as_str()?.to_owned(), entry)))
            .collect::<HashMap<_, _>>();

        let average = unlocked.iter().map(|(_, percent)| percent).sum::<f64>() / unlocked.len() as f64;
        let list = unlocked
            .iter()
            .map(|(name, percent)| {
                let detail = details.get(name);
                let field = |key: &str| {
                    detail
                        .and_then(|d| d.get(key))
                        .cloned()
                        .unwrap_or(Value::Null)
                };
                json!({
                    "name": name,
                    "display_name": field("displayName"),
                    "description": field("description"),
                    "hidden": field("hidden"),
                    "percent": percent,
                })
            })
            .collect::<Vec<_>>();

        Ok(payload([
            ("count", Some(json!(unlocked.len()))),
            ("percentage_average", Some(json!((average * 100.0).round() / 100.0))),
            ("achievements", Some(Value::Array(list))),
        ]))
    }
}

impl DataSource for SteamAchievementsAdapter {
    fn id(&self) -> SourceId {
        SourceId::SteamAchievements
    }

    fn policy(&self) -> ProviderPolicy {
        self.policy.clone()
    }

    fn validate_config(&self) -> Result<(), SourceError> {
        self.api_key().map(|_| ())
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

/// Percentages arrive as numbers or numeric strings.
fn percent_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|percent| percent.is_finite())
}

#[derive(Debug, Deserialize)]
struct PercentagesResponse {
    #[serde(default)]
    achievementpercentages: Option<PercentageList>,
}

#[derive(Debug, Deserialize)]
struct PercentageList {
    #[serde(default)]
    achievements: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    game: Option<SchemaGame>,
}

#[derive(Debug, Deserialize)]
struct SchemaGame {
    #[serde(rename = "availableGameStats", default)]
    available_game_stats: Option<SchemaStats>,
}

#[derive(Debug, Deserialize)]
struct SchemaStats {
    #[serde(default)]
    achievements: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpResponse, StaticHttpClient};
    use crate::AppId;

    fn request() -> FetchRequest {
        FetchRequest::new(AppId::parse("12345").expect("valid id"))
    }

    fn client(percentages: Value) -> StaticHttpClient {
        let schema = json!({
            "game": {
                "gameName": "Mock Game: The Adventure",
                "availableGameStats": {
                    "achievements": [
                        { "name": "Mock_1", "displayName": "Mock One", "hidden": 0, "description": "Clear Mock One" },
                        { "name": "Mock_3", "displayName": "Mock Three", "hidden": 1 }
                    ]
                }
            }
        });
        StaticHttpClient::new()
            .route("GetGlobalAchievementPercentagesForApp", HttpResponse::ok(percentages.to_string()))
            .route("GetSchemaForGame", HttpResponse::ok(schema.to_string()))
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let http = Arc::new(StaticHttpClient::new());
        let adapter = SteamAchievementsAdapter::new(http.clone(), None, "english");

        let outcome = adapter.fetch(&request()).await;

        assert_eq!(
            adapter.validate_config().map_err(|e| e.kind()),
            Err(SourceErrorKind::ConfigError)
        );
        assert_eq!(outcome.error().map(SourceError::kind), Some(SourceErrorKind::ConfigError));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn joins_percentages_with_schema_and_skips_malformed_entries() {
        let percentages = json!({
            "achievementpercentages": {
                "achievements": [
                    { "nama": "Mock_1", "percent": "12.3" },
                    { "name": "Mock_2", "percen": "12.3" },
                    { "name": "Mock_3", "percent": "10.5" },
                    { "name": "Mock_1", "percent": 20.1 }
                ]
            }
        });
        let adapter =
            SteamAchievementsAdapter::new(Arc::new(client(percentages)), Some("key".into()), "english");

        let outcome = adapter.fetch(&request()).await;

        let payload = outcome.payload().expect("payload");
        assert_eq!(payload.get("count"), Some(&json!(2)));
        assert_eq!(payload.get("percentage_average"), Some(&json!(15.3)));
        let list = payload.get("achievements").and_then(Value::as_array).expect("list");
        assert_eq!(list[0]["display_name"], json!("Mock Three"));
        assert_eq!(list[1]["name"], json!("Mock_1"));
        assert_eq!(list[1]["description"], json!("Clear Mock One"));
    }

    #[tokio::test]
    async fn no_achievements_is_not_found() {
        let percentages = json!({ "achievementpercentages": { "achievements": [] } });
        let adapter =
            SteamAchievementsAdapter::new(Arc::new(client(percentages)), Some("key".into()), "english");

        let outcome = adapter.fetch(&request()).await;

        assert_eq!(outcome.error().map(SourceError::kind), Some(SourceErrorKind::NotFound));
    }
}
