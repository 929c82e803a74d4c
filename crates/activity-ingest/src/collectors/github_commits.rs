use activity_types::{ActivitySource, CollectedActivity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ActivityCollector, CollectContext};
use crate::collection_window::CollectionWindow;
use crate::error::IngestResult;
use crate::github_api_client::{GithubApiClient, GithubCommit, GITHUB_SOURCE_LABEL};
use crate::paginator::{FetchOutcome, PageRequest, PageSource, Paginator};

pub const FIRST_COMMITS_PAGE: &str = "1";

/// Commits in `[since, until]`, paged by 1-based page number.
pub struct CommitPages<'a> {
    client: &'a GithubApiClient,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl<'a> CommitPages<'a> {
    pub fn new(client: &'a GithubApiClient, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            client,
            since,
            until,
        }
    }
}

fn page_number(cursor: &str) -> u32 {
    cursor.trim().parse::<u32>().unwrap_or(1).max(1)
}

#[async_trait]
impl<'a> PageSource for CommitPages<'a> {
    type Item = GithubCommit;

    fn label(&self) -> &'static str {
        GITHUB_SOURCE_LABEL
    }

    async fn fetch_page(&self, request: &PageRequest) -> IngestResult<FetchOutcome<GithubCommit>> {
        self.client
            .commits_page(
                self.since,
                self.until,
                page_number(&request.cursor),
                request.limit,
                request.attempt,
            )
            .await
    }

    fn next_cursor(&self, current: &str, _items: &[GithubCommit]) -> String {
        page_number(current).saturating_add(1).to_string()
    }
}

/// `None` for commits without a linked author account or commit date.
pub fn commit_to_activity(commit: &GithubCommit, repo_prefix: &str) -> Option<CollectedActivity> {
    let Some(login) = commit.author_login() else {
        tracing::debug!(sha = %commit.sha, "skipping commit without linked author");
        return None;
    };
    let Some(committed_at) = commit.committed_at() else {
        tracing::debug!(sha = %commit.sha, "skipping commit without commit date");
        return None;
    };
    Some(CollectedActivity::commit(
        repo_prefix,
        &commit.sha,
        login,
        committed_at,
        commit.commit.message.clone(),
    ))
}

pub struct GithubCommitCollector {
    client: GithubApiClient,
}

impl GithubCommitCollector {
    pub fn new(client: GithubApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActivityCollector for GithubCommitCollector {
    fn source(&self) -> ActivitySource {
        ActivitySource::GithubCommits
    }

    async fn collect(
        &self,
        window: &CollectionWindow,
        context: &CollectContext,
    ) -> IngestResult<Vec<CollectedActivity>> {
        let pages = CommitPages::new(&self.client, window.start, window.end);
        let mut paginator = Paginator::new(
            &pages,
            FIRST_COMMITS_PAGE,
            context.page_size,
            context.throttle,
            context.deadline,
        );
        let repo = self.client.repo();

        let mut collected = Vec::new();
        let mut skipped = 0_usize;
        while let Some(page) = paginator.next_page().await? {
            for commit in &page {
                // The server already applied since/until; keep what it returns.
                match commit_to_activity(commit, &repo.name) {
                    Some(activity) => collected.push(activity),
                    None => skipped = skipped.saturating_add(1),
                }
            }
        }

        tracing::info!(
            repo = %format!("{}/{}", repo.owner, repo.name),
            pages = paginator.pages_fetched(),
            collected = collected.len(),
            skipped,
            "github commit collection finished"
        );
        Ok(collected)
    }
}
