use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::{json, Value};
use time::Month;

use super::support::{cached_regex, payload, send};
use crate::data_source::{DataSource, FetchOutcome, FetchRequest, SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::SourceId;

const DEFAULT_BASE_URL: &str = "https://steamcharts.com";

const TITLE_PATTERN: &str = r#"(?s)<h1 id="app-title">\s*<a[^>]*>(.*?)</a>"#;
const STAT_PATTERN: &str = r#"(?s)<div class="app-stat">\s*<span class="num">\s*([\d,]+)\s*</span>"#;
const ROW_PATTERN: &str = concat!(
    r#"(?s)<tr[^>]*>\s*<td class="month-cell[^"]*">\s*(.*?)\s*</td>"#,
    r#"\s*<td[^>]*>\s*(.*?)\s*</td>"#,
    r#"\s*<td[^>]*>\s*(.*?)\s*</td>"#,
    r#"\s*<td[^>]*>\s*(.*?)\s*</td>"#,
    r#"\s*<td[^>]*>\s*(.*?)\s*</td>"#,
);

static TITLE: OnceLock<Option<Regex>> = OnceLock::new();
static STAT: OnceLock<Option<Regex>> = OnceLock::new();
static ROW: OnceLock<Option<Regex>> = OnceLock::new();

/// SteamCharts page scraper: live player counts and the monthly history table.
///
/// Monthly rows are keyed `YYYY-MM`; the rolling "Last 30 Days" row has no
/// calendar month and is left out of the series.
#[derive(Clone)]
pub struct SteamChartsAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    base_url: String,
}

impl SteamChartsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            policy: ProviderPolicy::default_for(SourceId::SteamCharts),
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
        let http_request = HttpRequest::get(format!(
            "{}/app/{}",
            self.base_url,
            urlencoding::encode(app_id)
        ));
        let response = send(self.http_client.as_ref(), &self.policy, http_request).await?;
        parse_page(app_id, &response.body)
    }
}

impl DataSource for SteamChartsAdapter {
    fn id(&self) -> SourceId {
        SourceId::SteamCharts
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

fn parse_page(app_id: &str, html: &str) -> Result<SourcePayload, SourceError> {
    let name = cached_regex(&TITLE, TITLE_PATTERN)?
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| SourceError::not_found(format!("steamcharts has no page for appid {app_id}")))?;

    let stats = cached_regex(&STAT, STAT_PATTERN)?
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_number(m.as_str())))
        .collect::<Vec<_>>();
    let (current, peak_24h, peak_all_time) = match stats.as_slice() {
        [current, peak_24h, peak_all_time, ..] => (*current, *peak_24h, *peak_all_time),
        _ => {
            return Err(SourceError::parse(format!(
                "steamcharts page for appid {app_id} has {} player stats, expected 3",
                stats.len()
            )));
        }
    };

    let monthly = cached_regex(&ROW, ROW_PATTERN)?
        .captures_iter(html)
        .filter_map(|caps| {
            let month = month_key(caps.get(1)?.as_str())?;
            let cell = |index: usize| caps.get(index).and_then(|m| parse_number(m.as_str()));
            Some(json!({
                "month": month,
                "average_players": cell(2),
                "gain": cell(3),
                "percentage_gain": cell(4),
                "peak_players": cell(5).map(|peak| peak as i64),
            }))
        })
        .collect::<Vec<_>>();

    Ok(payload([
        ("name", Some(Value::String(name))),
        ("current_players", Some(json!(current as i64))),
        ("peak_24h", Some(json!(peak_24h as i64))),
        ("peak_all_time", Some(json!(peak_all_time as i64))),
        ("monthly", Some(Value::Array(monthly))),
    ]))
}

/// `"June 2024"` to `"2024-06"`.
fn month_key(label: &str) -> Option<String> {
    let mut parts = label.split_whitespace();
    let month = Month::from_str(parts.next()?).ok()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(format!("{year:04}-{:02}", u8::from(month)))
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '+'))
        .collect::<String>();
    cleaned.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}
