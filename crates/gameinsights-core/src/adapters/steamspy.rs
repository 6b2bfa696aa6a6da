use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::support::{parse_json, send};
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::SourceId;

const DEFAULT_BASE_URL: &str = "https://steamspy.com";

/// SteamSpy `appdetails` adapter.
///
/// Keys are SteamSpy's own: `owners` is a range string such as
/// `"1,000,000 .. 2,000,000"`, prices are cents, playtimes are minutes.
/// The `tags` vote map is reduced to tag names ordered by vote count.
#[derive(Clone)]
pub struct SteamSpyAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
}

impl SteamSpyAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::SteamSpy),
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

    async fn fetch_payload(&self, request: &FetchRequest) -> Result<SourcePayload, SourceError> {
        let app_id = request.app_id.as_str();
        let http_request = HttpRequest::get(format!("{}/api.php", self.base_url))
            .with_query("request", "appdetails")
            .with_query("appid", app_id);
        let response = send(self.http_client.as_ref(), &self.policy, http_request).await?;

        let mut body: SourcePayload = parse_json(&self.policy, &response.body)?;
        let has_name = body
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            return Err(SourceError::not_found(format!(
                "steamspy has no data for appid {app_id}"
            )));
        }

        if let Some(tags) = body.remove("tags") {
            if let Some(names) = tag_names(&tags) {
                body.insert(String::from("tags"), names);
            }
        }
        Ok(body)
    }
}

impl DataSource for SteamSpyAdapter {
    fn id(&self) -> SourceId {
        SourceId::SteamSpy
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

/// `{"Action": 120, "MOBA": 300}` to `["MOBA", "Action"]`; an empty `[]` stays empty.
fn tag_names(tags: &Value) -> Option<Value> {
    match tags {
        Value::Object(votes) => {
            let mut ranked = votes
                .iter()
                .map(|(name, count)| (name.clone(), count.as_i64().unwrap_or(0)))
                .collect::<Vec<_>>();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            Some(Value::Array(
                ranked.into_iter().map(|(name, _)| Value::String(name)).collect(),
            ))
        }
        Value::Array(_) => Some(tags.clone()),
        _ => None,
    }
}
