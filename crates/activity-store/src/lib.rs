//! Activity store abstractions and in-memory backend.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;

mod sqlite;

pub use activity_types::{Activity, ActivityKind};
pub use sqlite::SqliteActivityStore;

/// Result type for activity store operations.
pub type StoreResult<T> = Result<T, ActivityStoreError>;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum ActivityStoreError {
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One record that could not be written during a batch upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub activity_id: String,
    pub error: String,
}

/// Outcome of a best-effort batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteOutcome {
    pub written: usize,
    pub failures: Vec<WriteFailure>,
}

/// Upsert-capable keyed store plus the read projections used by operators.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Inserts `activity` or replaces the record with the same id.
    async fn upsert_by_id(&self, activity: &Activity) -> StoreResult<()>;

    /// Writes every record independently. A failed record is reported and
    /// never stops the remaining writes.
    async fn upsert_batch(&self, activities: &[Activity]) -> BatchWriteOutcome {
        let mut outcome = BatchWriteOutcome::default();
        for activity in activities {
            match self.upsert_by_id(activity).await {
                Ok(()) => outcome.written = outcome.written.saturating_add(1),
                Err(error) => {
                    tracing::warn!(
                        activity_id = %activity.id,
                        error = %error,
                        "failed to upsert activity"
                    );
                    outcome.failures.push(WriteFailure {
                        activity_id: activity.id.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }
        outcome
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Activity>>;
    async fn count(&self) -> StoreResult<u64>;

    /// Activity counts per UTC calendar day, inclusive of both bounds.
    async fn daily_counts(
        &self,
        user_id: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> StoreResult<BTreeMap<NaiveDate, u64>>;
    async fn total_for_user(&self, user_id: &str) -> StoreResult<u64>;
    async fn activities_on(&self, user_id: &str, date: NaiveDate) -> StoreResult<Vec<Activity>>;
}

/// In-memory implementation for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    inner: RwLock<HashMap<String, Activity>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn upsert_by_id(&self, activity: &Activity) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Activity>> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.inner.read().await.len() as u64)
    }

    async fn daily_counts(
        &self,
        user_id: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> StoreResult<BTreeMap<NaiveDate, u64>> {
        let inner = self.inner.read().await;
        let mut counts = BTreeMap::new();
        for activity in inner.values().filter(|activity| activity.user_id == user_id) {
            let day = activity.timestamp.date_naive();
            if day < since || day > until {
                continue;
            }
            let entry = counts.entry(day).or_insert(0_u64);
            *entry = entry.saturating_add(1);
        }
        Ok(counts)
    }

    async fn total_for_user(&self, user_id: &str) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .values()
            .filter(|activity| activity.user_id == user_id)
            .count() as u64)
    }

    async fn activities_on(&self, user_id: &str, date: NaiveDate) -> StoreResult<Vec<Activity>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Activity> = inner
            .values()
            .filter(|activity| {
                activity.user_id == user_id && activity.timestamp.date_naive() == date
            })
            .cloned()
            .collect();
        rows.sort_by(|left, right| {
            left.timestamp
                .cmp(&right.timestamp)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(rows)
    }
}
