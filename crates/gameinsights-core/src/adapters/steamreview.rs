use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::support::{parse_json, payload, send};
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::reviews::{ReviewPage, ReviewQuery};
use crate::{AppId, SourceId};

const DEFAULT_BASE_URL: &str = "https://store.steampowered.com";

/// Steam review adapter.
///
/// As a [`DataSource`] it reports the `appreviews` query summary only;
/// [`fetch_review_page`](Self::fetch_review_page) reads the review list.
#[derive(Clone)]
pub struct SteamReviewAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
}

impl SteamReviewAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::SteamReview),
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

    fn listing(&self, app_id: &str) -> HttpRequest {
        HttpRequest::get(format!(
            "{}/appreviews/{}",
            self.base_url,
            urlencoding::encode(app_id)
        ))
        .with_query("json", "1")
    }

    async fn query(&self, app_id: &str, request: HttpRequest) -> Result<ReviewResponse, SourceError> {
        let response = send(self.http_client.as_ref(), &self.policy, request).await?;
        let body: ReviewResponse = parse_json(&self.policy, &response.body)?;
        if body.success.as_i64() != Some(1) {
            return Err(SourceError::not_found(format!(
                "steamreview has no reviews for appid {app_id}"
            )));
        }
        Ok(body)
    }

    async fn fetch_payload(&self, request: &FetchRequest) -> Result<SourcePayload, SourceError> {
        let app_id = request.app_id.as_str();
        let http_request = self
            .listing(app_id)
            .with_query("language", "all")
            .with_query("purchase_type", "all")
            .with_query("filter", "all")
            .with_query("num_per_page", "0");
        let body = self.query(app_id, http_request).await?;
        let summary = body.query_summary.ok_or_else(|| {
            SourceError::parse(format!(
                "steamreview response for appid {app_id} has no query summary"
            ))
        })?;

        Ok(payload(
            [
                "review_score",
                "review_score_desc",
                "total_positive",
                "total_negative",
                "total_reviews",
            ]
            .map(|key| (key, summary.get(key).cloned())),
        ))
    }

    /// One page of the review list starting at `cursor` (`*` for the first).
    pub async fn fetch_review_page(
        &self,
        app_id: &AppId,
        query: &ReviewQuery,
        cursor: &str,
    ) -> Result<ReviewPage, SourceError> {
        let http_request = self
            .listing(app_id.as_str())
            .with_query("filter", &query.filter)
            .with_query("language", &query.language)
            .with_query("review_type", &query.review_type)
            .with_query("purchase_type", &query.purchase_type)
            .with_query("num_per_page", query.per_page.to_string())
            .with_query("cursor", cursor);
        let body = self.query(app_id.as_str(), http_request).await?;

        Ok(ReviewPage {
            summary: body.query_summary,
            reviews: body
                .reviews
                .into_iter()
                .filter_map(|review| match review {
                    Value::Object(review) => Some(review),
                    _ => None,
                })
                .collect(),
            cursor: body.cursor.filter(|cursor| !cursor.is_empty()),
        })
    }
}

impl DataSource for SteamReviewAdapter {
    fn id(&self) -> SourceId {
        SourceId::SteamReview
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
struct ReviewResponse {
    #[serde(default)]
    success: Value,
    #[serde(default)]
    query_summary: Option<SourcePayload>,
    #[serde(default)]
    reviews: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}
