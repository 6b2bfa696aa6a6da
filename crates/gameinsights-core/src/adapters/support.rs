//! Transport plumbing shared by the HTTP-backed adapters.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::data_source::{SourceError, SourcePayload};
use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest, HttpResponse};
use crate::provider_policy::ProviderPolicy;
use crate::retry::execute_with_retry;

/// Sends `request` with the policy's retry and timeout settings and maps
/// transport failures and non-2xx statuses into source errors.
pub(crate) async fn send(
    client: &dyn HttpClient,
    policy: &ProviderPolicy,
    request: HttpRequest,
) -> Result<HttpResponse, SourceError> {
    let source = policy.source;
    let timeout_ms = u64::try_from(policy.request_timeout.as_millis()).unwrap_or(u64::MAX);
    let request = request.with_timeout_ms(timeout_ms);

    let response = execute_with_retry(client, request, &policy.retry)
        .await
        .map_err(|error| match error.kind() {
            HttpErrorKind::Timeout => {
                SourceError::timeout(format!("{source} request timed out: {}", error.message()))
            }
            HttpErrorKind::Connect | HttpErrorKind::Other => {
                SourceError::transport(format!("{source} transport error: {}", error.message()))
            }
        })?;

    if !response.is_success() {
        return Err(SourceError::from_status(source, response.status));
    }
    Ok(response)
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    policy: &ProviderPolicy,
    body: &str,
) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| {
        SourceError::parse(format!("failed to parse {} response: {e}", policy.source))
    })
}

/// Compiles `pattern` once per call site.
pub(crate) fn cached_regex(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Result<&'static Regex, SourceError> {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .ok_or_else(|| SourceError::parse(format!("invalid extraction pattern: {pattern}")))
}

/// Builds a payload from `(key, value)` pairs, skipping nulls.
pub(crate) fn payload<I>(entries: I) -> SourcePayload
where
    I: IntoIterator<Item = (&'static str, Option<Value>)>,
{
    entries
        .into_iter()
        .filter_map(|(key, value)| match value {
            Some(Value::Null) | None => None,
            Some(value) => Some((key.to_owned(), value)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, StaticHttpClient};
    use crate::retry::RetryConfig;
    use crate::SourceId;

    fn policy() -> ProviderPolicy {
        let mut policy = ProviderPolicy::default_for(SourceId::SteamSpy);
        policy.retry = RetryConfig::no_retry();
        policy
    }

    #[tokio::test]
    async fn maps_transport_failures_to_source_kinds() {
        let client = StaticHttpClient::new()
            .route_error("slow", HttpError::timeout("deadline"))
            .route_error("down", HttpError::connect("refused"))
            .route("limited", HttpResponse::with_status(429, ""));

        let slow = send(&client, &policy(), HttpRequest::get("https://slow.test"))
            .await
            .expect_err("timeout");
        let down = send(&client, &policy(), HttpRequest::get("https://down.test"))
            .await
            .expect_err("connect");
        let limited = send(&client, &policy(), HttpRequest::get("https://limited.test"))
            .await
            .expect_err("429");

        assert_eq!(slow.kind(), SourceErrorKind::Timeout);
        assert_eq!(down.kind(), SourceErrorKind::TransportError);
        assert_eq!(limited.kind(), SourceErrorKind::RateLimited);
    }

    #[test]
    fn undecodable_body_is_parse_error() {
        let error = parse_json::<Value>(&policy(), "<html>").expect_err("not json");
        assert_eq!(error.kind(), SourceErrorKind::ParseError);
    }

    #[test]
    fn payload_skips_missing_and_null_values() {
        let built = payload([
            ("name", Some(json!("Dota 2"))),
            ("price", None),
            ("owners", Some(Value::Null)),
        ]);

        assert_eq!(built.len(), 1);
        assert_eq!(built.get("name"), Some(&json!("Dota 2")));
    }
}
