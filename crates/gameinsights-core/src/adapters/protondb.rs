use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::support::{parse_json, payload, send};
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::SourceId;

const DEFAULT_BASE_URL: &str = "https://www.protondb.com";

/// ProtonDB report-summary adapter (Linux / Steam Deck compatibility).
#[derive(Clone)]
pub struct ProtonDbAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
}

impl ProtonDbAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::ProtonDb),
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
        let http_request = HttpRequest::get(format!(
            "{}/api/v1/reports/summaries/{}.json",
            self.base_url,
            urlencoding::encode(request.app_id.as_str())
        ));
        let response = send(self.http_client.as_ref(), &self.policy, http_request).await?;
        let summary: SourcePayload = parse_json(&self.policy, &response.body)?;

        Ok(payload(
            ["tier", "score", "trendingTier", "confidence", "total", "bestReportedTier"]
                .map(|key| (key, summary.get(key).cloned())),
        ))
    }
}

impl DataSource for ProtonDbAdapter {
    fn id(&self) -> SourceId {
        SourceId::ProtonDb
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
