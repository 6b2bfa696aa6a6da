//! Review export.
//!
//! Pages through the Steam review list of one app id with the review
//! cursor. Every page is one call under the Steam review governor and the
//! fetch timeout. Paging stops when a page comes back empty, the cursor
//! stops moving or the caller's limit is reached.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::adapters::SteamReviewAdapter;
use crate::config::CollectorConfig;
use crate::data_source::{DataSource, SourceError, SourcePayload};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::throttling::RateGovernor;
use crate::{AppId, ValidationError};

/// Cursor value that starts a review listing.
pub const FIRST_PAGE_CURSOR: &str = "*";

const MAX_PAGE_SIZE: u32 = 100;

/// Filters sent with every review page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQuery {
    /// `recent`, `updated` or `all`.
    pub filter: String,
    pub language: String,
    /// `all`, `positive` or `negative`.
    pub review_type: String,
    /// `all`, `steam` or `non_steam_purchase`.
    pub purchase_type: String,
    pub per_page: u32,
    /// Stop after this many reviews; `None` pages to the end.
    pub limit: Option<usize>,
}

impl Default for ReviewQuery {
    fn default() -> Self {
        Self {
            filter: String::from("recent"),
            language: String::from("all"),
            review_type: String::from("all"),
            purchase_type: String::from("all"),
            per_page: MAX_PAGE_SIZE,
            limit: None,
        }
    }
}

impl ReviewQuery {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_review_type(mut self, review_type: impl Into<String>) -> Self {
        self.review_type = review_type.into();
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.per_page) {
            return Err(ValidationError::InvalidReviewPageSize {
                value: self.per_page,
            });
        }
        Ok(())
    }
}

/// One page of the review listing as the provider returned it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReviewPage {
    pub summary: Option<SourcePayload>,
    pub reviews: Vec<SourcePayload>,
    pub cursor: Option<String>,
}

/// Reviews of one app id with the query summary of the first page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewExport {
    pub app_id: AppId,
    pub summary: SourcePayload,
    /// Provider review objects, verbatim, in listing order.
    pub reviews: Vec<SourcePayload>,
    pub pages: usize,
    /// False when a later page failed and the listing was cut short.
    pub complete: bool,
}

/// Exports the review list of an app id.
#[derive(Clone)]
pub struct ReviewExporter {
    adapter: Arc<SteamReviewAdapter>,
    governor: RateGovernor,
    fetch_timeout: Duration,
}

impl ReviewExporter {
    pub fn new(adapter: SteamReviewAdapter, config: &CollectorConfig) -> Result<Self, ValidationError> {
        let policy = adapter.policy();
        let capped = policy.max_wait.min(config.max_wait);
        Ok(Self {
            governor: RateGovernor::from_policy(&policy.with_max_wait(capped))?,
            adapter: Arc::new(adapter),
            fetch_timeout: config.fetch_timeout,
        })
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self, ValidationError> {
        let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        Self::new(SteamReviewAdapter::new(http_client), config)
    }

    pub fn with_governor(mut self, governor: RateGovernor) -> Self {
        self.governor = governor;
        self
    }

    /// Fails only when the first page fails; a later failure ends the
    /// listing early with `complete: false`.
    pub async fn export(
        &self,
        app_id: &AppId,
        query: &ReviewQuery,
    ) -> Result<ReviewExport, SourceError> {
        query
            .validate()
            .map_err(|error| SourceError::config(error.to_string()))?;

        let mut export = ReviewExport {
            app_id: app_id.clone(),
            summary: SourcePayload::new(),
            reviews: Vec::new(),
            pages: 0,
            complete: true,
        };
        let mut cursor = String::from(FIRST_PAGE_CURSOR);

        loop {
            let page = match self.page(app_id, query, &cursor).await {
                Ok(page) => page,
                Err(error) if export.pages == 0 => return Err(error),
                Err(error) => {
                    warn!(app_id = %app_id, pages = export.pages, error = %error, "review listing cut short");
                    export.complete = false;
                    break;
                }
            };
            export.pages += 1;
            if export.pages == 1 {
                export.summary = page.summary.unwrap_or_default();
            }

            let received = page.reviews.len();
            export.reviews.extend(page.reviews);
            if let Some(limit) = query.limit {
                if export.reviews.len() >= limit {
                    export.reviews.truncate(limit);
                    break;
                }
            }
            match page.cursor {
                Some(next) if received > 0 && next != cursor => cursor = next,
                _ => break,
            }
        }

        debug!(
            app_id = %app_id,
            pages = export.pages,
            reviews = export.reviews.len(),
            "review export finished"
        );
        Ok(export)
    }

    async fn page(
        &self,
        app_id: &AppId,
        query: &ReviewQuery,
        cursor: &str,
    ) -> Result<ReviewPage, SourceError> {
        self.governor
            .acquire()
            .await
            .map_err(|exceeded| SourceError::rate_limited(exceeded.to_string()))?;
        tokio::time::timeout(
            self.fetch_timeout,
            self.adapter.fetch_review_page(app_id, query, cursor),
        )
        .await
        .map_err(|_| {
            SourceError::timeout(format!(
                "steamreview did not answer within {} ms",
                self.fetch_timeout.as_millis()
            ))
        })?
    }
}
