//! Cursor-driven page fetching with throttle handling.
//!
//! A [`PageSource`] performs one request and classifies the response as a
//! [`FetchOutcome`]. [`Paginator`] owns the cursor: it retries throttled
//! requests with the same cursor, fails the run on any other non-success
//! status, and stops on an empty or short page.

use std::time::Duration;

use async_trait::async_trait;

use crate::deadline::RunDeadline;
use crate::error::{IngestError, IngestResult};
use crate::retry::ThrottlePolicy;

/// One page request. `attempt` counts throttled retries of this cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: String,
    pub limit: usize,
    pub attempt: usize,
}

/// Classified response of a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    Page(Vec<T>),
    Throttled { retry_after: Option<Duration> },
    Fatal { status: u16, detail: String },
}

/// Trait contract for one paginated endpoint.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    fn label(&self) -> &'static str;

    /// Transport and decode failures return `Err`; status handling is
    /// reported through the outcome.
    async fn fetch_page(&self, request: &PageRequest) -> IngestResult<FetchOutcome<Self::Item>>;

    /// Cursor for the page following `items`, fetched with `current`.
    fn next_cursor(&self, current: &str, items: &[Self::Item]) -> String;
}

pub struct Paginator<'a, S: PageSource> {
    source: &'a S,
    cursor: String,
    page_size: usize,
    policy: ThrottlePolicy,
    deadline: RunDeadline,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a, S: PageSource> Paginator<'a, S> {
    pub fn new(
        source: &'a S,
        initial_cursor: impl Into<String>,
        page_size: usize,
        policy: ThrottlePolicy,
        deadline: RunDeadline,
    ) -> Self {
        Self {
            source,
            cursor: initial_cursor.into(),
            page_size: page_size.max(1),
            policy,
            deadline,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetches the next non-empty page, or `None` at end of stream.
    pub async fn next_page(&mut self) -> IngestResult<Option<Vec<S::Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        let label = self.source.label();
        let mut throttled = 0_usize;
        loop {
            self.deadline.check(format!("{label} page fetch"))?;
            let request = PageRequest {
                cursor: self.cursor.clone(),
                limit: self.page_size,
                attempt: throttled,
            };

            match self.source.fetch_page(&request).await? {
                FetchOutcome::Page(items) => {
                    self.pages_fetched = self.pages_fetched.saturating_add(1);
                    if items.is_empty() {
                        tracing::debug!(source = label, cursor = %request.cursor, "empty page, end of stream");
                        self.exhausted = true;
                        return Ok(None);
                    }
                    if items.len() < self.page_size {
                        self.exhausted = true;
                    }
                    self.cursor = self.source.next_cursor(&request.cursor, &items);
                    tracing::debug!(
                        source = label,
                        cursor = %request.cursor,
                        next_cursor = %self.cursor,
                        items = items.len(),
                        "fetched page"
                    );
                    return Ok(Some(items));
                }
                FetchOutcome::Throttled { retry_after } => {
                    if !self.policy.allows_retry(throttled) {
                        return Err(IngestError::ThrottleRetriesExhausted {
                            source_label: label,
                            attempts: throttled.saturating_add(1),
                        });
                    }
                    let delay = self.policy.delay_for(retry_after);
                    tracing::warn!(
                        source = label,
                        cursor = %request.cursor,
                        attempt = throttled,
                        delay_ms = delay.as_millis() as u64,
                        "throttled, retrying same cursor"
                    );
                    self.deadline
                        .sleep(delay, &format!("{label} throttle backoff"))
                        .await?;
                    throttled = throttled.saturating_add(1);
                }
                FetchOutcome::Fatal { status, detail } => {
                    return Err(IngestError::UnexpectedStatus {
                        source_label: label,
                        status,
                        body: detail,
                    });
                }
            }
        }
    }
}
