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

const DEFAULT_BASE_URL: &str = "https://store.steampowered.com";

/// Steam Store `appdetails` adapter: identity, pricing, release and catalogue data.
///
/// Prices stay in the store's minor currency unit (cents).
#[derive(Clone)]
pub struct SteamStoreAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
    region: String,
    language: String,
}

impl SteamStoreAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        region: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::SteamStore),
            base_url: String::from(DEFAULT_BASE_URL),
            region: region.into(),
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

    async fn fetch_payload(&self, request: &FetchRequest) -> Result<SourcePayload, SourceError> {
        let app_id = request.app_id.as_str();
        let http_request = HttpRequest::get(format!("{}/api/appdetails", self.base_url))
            .with_query("appids", app_id)
            .with_query("cc", &self.region)
            .with_query("l", &self.language);
        let response = send(self.http_client.as_ref(), &self.policy, http_request).await?;

        let mut body: HashMap<String, AppDetailsEnvelope> =
            parse_json(&self.policy, &response.body)?;
        let Some(envelope) = body.remove(app_id) else {
            return Err(SourceError::parse(format!(
                "steamstore response has no entry for appid {app_id}"
            )));
        };

        match envelope.data {
            Some(data) if envelope.success && data.is_object() => Ok(flatten(&data)),
            _ => Err(SourceError::not_found(format!(
                "steamstore has no data for appid {app_id}; not available in the specified region"
            ))),
        }
    }
}

impl DataSource for SteamStoreAdapter {
    fn id(&self) -> SourceId {
        SourceId::SteamStore
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

#[derive(Debug, Deserialize)]
struct AppDetailsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
}

fn flatten(data: &Value) -> SourcePayload {
    let price = data.get("price_overview");
    let release = data.get("release_date");
    let is_free = data.get("is_free").and_then(Value::as_bool).unwrap_or(false);
    let free_price = (is_free && price.and_then(Value::as_object).is_none()).then(|| json!(0));

    payload([
        ("steam_appid", data.get("steam_appid").cloned()),
        ("name", data.get("name").cloned()),
        ("type", data.get("type").cloned()),
        ("is_free", data.get("is_free").cloned()),
        (
            "is_coming_soon",
            release.and_then(|r| r.get("coming_soon")).cloned(),
        ),
        ("release_date", release.and_then(|r| r.get("date")).cloned()),
        ("developers", data.get("developers").cloned()),
        ("publishers", data.get("publishers").cloned()),
        ("currency", price.and_then(|p| p.get("currency")).cloned()),
        (
            "initial",
            price.and_then(|p| p.get("initial")).cloned().or(free_price.clone()),
        ),
        (
            "final",
            price.and_then(|p| p.get("final")).cloned().or(free_price),
        ),
        (
            "discount_percent",
            price.and_then(|p| p.get("discount_percent")).cloned(),
        ),
        ("categories", descriptions(data.get("categories"))),
        ("genres", descriptions(data.get("genres"))),
        ("platforms", platforms(data.get("platforms"))),
        (
            "metacritic",
            data.get("metacritic").and_then(|m| m.get("score")).cloned(),
        ),
        (
            "recommendations",
            data.get("recommendations").and_then(|r| r.get("total")).cloned(),
        ),
        ("content_rating", ratings(data.get("ratings"))),
    ])
}

/// `[{"id": 1, "description": "Multi-player"}]` to `["Multi-player"]`.
fn descriptions(value: Option<&Value>) -> Option<Value> {
    let names = value?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("description").and_then(Value::as_str))
        .map(|name| Value::String(name.to_owned()))
        .collect::<Vec<_>>();
    (!names.is_empty()).then_some(Value::Array(names))
}

/// `{"windows": true, "mac": false}` to `["windows"]`.
fn platforms(value: Option<&Value>) -> Option<Value> {
    let supported = value?
        .as_object()?
        .iter()
        .filter(|(_, enabled)| enabled.as_bool() == Some(true))
        .map(|(name, _)| Value::String(name.clone()))
        .collect::<Vec<_>>();
    Some(Value::Array(supported))
}

fn ratings(value: Option<&Value>) -> Option<Value> {
    let rows = value?
        .as_object()?
        .iter()
        .map(|(board, rating)| {
            json!({
                "rating_type": board,
                "rating": rating.get("rating").cloned().unwrap_or(Value::Null),
                "descriptors": rating.get("descriptors").cloned().unwrap_or(Value::Null),
            })
        })
        .collect::<Vec<_>>();
    Some(Value::Array(rows))
}
