use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::support::{parse_json, send};
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::SourceId;

const DEFAULT_BASE_URL: &str = "https://api.gamalytic.com";

/// Gamalytic game-analytics adapter.
///
/// The API answers with a flat object (`copiesSold`, `revenue`, `avgPlaytime`
/// in hours, `releaseDate` in epoch milliseconds) which is passed through as
/// the payload. The API key is optional; without one the public tier is used.
#[derive(Clone)]
pub struct GamalyticAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
    api_key: Option<String>,
}

impl GamalyticAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::Gamalytic),
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

    async fn fetch_payload(&self, request: &FetchRequest) -> Result<SourcePayload, SourceError> {
        let app_id = request.app_id.as_str();
        let mut http_request = HttpRequest::get(format!(
            "{}/game/{}",
            self.base_url,
            urlencoding::encode(app_id)
        ));
        if let Some(api_key) = &self.api_key {
            http_request = http_request.with_header("api-key", api_key);
        }

        let response = send(self.http_client.as_ref(), &self.policy, http_request).await?;
        let body: SourcePayload = parse_json(&self.policy, &response.body)?;
        if body.is_empty() {
            return Err(SourceError::not_found(format!(
                "gamalytic has no data for appid {app_id}"
            )));
        }
        Ok(body)
    }
}

impl DataSource for GamalyticAdapter {
    fn id(&self) -> SourceId {
        SourceId::Gamalytic
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
