//! Shared reqwest plumbing: client construction and the mapping from an
//! HTTP response to a [`FetchOutcome`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{IngestError, IngestResult};
use crate::paginator::FetchOutcome;
use crate::retry::truncate_for_error;

pub const USER_AGENT_VALUE: &str = "activity-ingest";

/// Sent with every page request; counts throttled retries of one cursor.
pub const RETRY_ATTEMPT_HEADER: &str = "x-activity-retry-attempt";

const ERROR_BODY_MAX_CHARS: usize = 800;

pub(crate) fn build_http_client(
    source_label: &'static str,
    authorization: Option<&str>,
    accept: &'static str,
    extra_headers: &[(&'static str, &'static str)],
    request_timeout: Duration,
) -> IngestResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    for (name, value) in extra_headers {
        headers.insert(*name, HeaderValue::from_static(*value));
    }
    if let Some(authorization) = authorization {
        let value = HeaderValue::from_str(authorization).map_err(|_| {
            IngestError::InvalidConfig(format!("invalid {source_label} authorization header"))
        })?;
        headers.insert(AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(request_timeout.max(Duration::from_millis(1)))
        .build()
        .map_err(|source| IngestError::Transport {
            source_label,
            operation: "client setup",
            source,
        })
}

/// Sends one page request and classifies the response.
///
/// `throttle_hint` returns `Some(hint)` when the status/headers mean "slow
/// down", carrying the optional delay the server asked for.
pub(crate) async fn fetch_json_page<T, F>(
    source_label: &'static str,
    request: RequestBuilder,
    attempt: usize,
    throttle_hint: F,
) -> IngestResult<FetchOutcome<T>>
where
    T: DeserializeOwned,
    F: Fn(StatusCode, &HeaderMap) -> Option<Option<Duration>>,
{
    let response = request
        .header(RETRY_ATTEMPT_HEADER, attempt.to_string())
        .send()
        .await
        .map_err(|source| IngestError::Transport {
            source_label,
            operation: "page",
            source,
        })?;

    let status = response.status();
    if let Some(retry_after) = throttle_hint(status, response.headers()) {
        return Ok(FetchOutcome::Throttled { retry_after });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Ok(FetchOutcome::Fatal {
            status: status.as_u16(),
            detail: truncate_for_error(&body, ERROR_BODY_MAX_CHARS),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| IngestError::Transport {
            source_label,
            operation: "page body",
            source,
        })?;
    let items = serde_json::from_slice::<Vec<T>>(&bytes).map_err(|error| IngestError::Decode {
        source_label,
        detail: error.to_string(),
    })?;
    Ok(FetchOutcome::Page(items))
}
