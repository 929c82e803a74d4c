use std::time::{Duration, Instant};

use crate::error::{IngestError, IngestResult};

// ~100 years.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Outer bound on one ingestion run, checked before every external call.
#[derive(Debug, Clone, Copy)]
pub struct RunDeadline {
    expires_at: Instant,
}

impl RunDeadline {
    /// Budgets too large to represent saturate to a far-future instant.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(budget)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self { expires_at }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn check(&self, operation: impl Into<String>) -> IngestResult<()> {
        if self.is_expired() {
            return Err(IngestError::DeadlineExceeded {
                operation: operation.into(),
            });
        }
        Ok(())
    }

    /// Sleeps for `delay`, or fails once the sleep would outlive the run.
    pub async fn sleep(&self, delay: Duration, operation: &str) -> IngestResult<()> {
        if delay >= self.remaining() {
            return Err(IngestError::DeadlineExceeded {
                operation: operation.to_string(),
            });
        }
        tokio::time::sleep(delay).await;
        Ok(())
    }
}
