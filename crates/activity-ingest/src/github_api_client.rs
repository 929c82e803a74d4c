//! GitHub REST client for time-windowed commit listings.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{IngestError, IngestResult};
use crate::http_transport::{build_http_client, fetch_json_page};
use crate::paginator::FetchOutcome;
use crate::retry::{parse_ratelimit_reset, parse_retry_after};

pub const GITHUB_SOURCE_LABEL: &str = "github";
pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: &str, name: &str) -> IngestResult<Self> {
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(IngestError::InvalidConfig(format!(
                "invalid github repository '{owner}/{name}'"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GithubGitActor {
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GithubCommitDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub committer: Option<GithubGitActor>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GithubCommit {
    pub sha: String,
    pub commit: GithubCommitDetail,
    /// Linked account of the commit author; null for unlinked emails.
    #[serde(default)]
    pub author: Option<GithubUser>,
}

impl GithubCommit {
    pub fn author_login(&self) -> Option<&str> {
        self.author
            .as_ref()
            .map(|author| author.login.trim())
            .filter(|login| !login.is_empty())
    }

    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit
            .committer
            .as_ref()
            .and_then(|committer| committer.date)
            .map(|date| date.with_timezone(&Utc))
    }
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubApiClient {
    pub fn new(
        api_base: &str,
        token: Option<&str>,
        repo: RepoRef,
        request_timeout: Duration,
    ) -> IngestResult<Self> {
        let authorization = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| format!("Bearer {token}"));
        let http = build_http_client(
            GITHUB_SOURCE_LABEL,
            authorization.as_deref(),
            "application/vnd.github+json",
            &[("x-github-api-version", "2022-11-28")],
            request_timeout,
        )?;
        Ok(Self {
            http,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            repo,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// One page of commits whose commit date lies in `[since, until]`.
    pub async fn commits_page(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        page: u32,
        per_page: usize,
        attempt: usize,
    ) -> IngestResult<FetchOutcome<GithubCommit>> {
        let request = self
            .http
            .get(format!(
                "{}/repos/{}/{}/commits",
                self.api_base, self.repo.owner, self.repo.name
            ))
            .query(&[
                ("since", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("until", until.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ]);
        fetch_json_page(GITHUB_SOURCE_LABEL, request, attempt, github_throttle_hint).await
    }
}

/// 429, or 403 with an exhausted primary rate limit.
fn github_throttle_hint(status: StatusCode, headers: &HeaderMap) -> Option<Option<Duration>> {
    let exhausted_quota = status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            == Some("0");
    if status != StatusCode::TOO_MANY_REQUESTS && !exhausted_quota {
        return None;
    }
    Some(parse_retry_after(headers).or_else(|| parse_ratelimit_reset(headers, Utc::now())))
}
