//! SQLite-backed `ActivityStore` implementation with durable persistence.

use crate::{Activity, ActivityKind, ActivityStore, ActivityStoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Naive UTC; the column carries no offset.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str = "id, user_id, timestamp, type, body, is_special";

/// Persistent SQLite activity store.
#[derive(Debug)]
pub struct SqliteActivityStore {
    db_path: PathBuf,
}

impl SqliteActivityStore {
    /// Opens (or creates) the store at `path`, creating schema if needed.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        store.initialize_schema(&connection)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> StoreResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                type TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                is_special INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_activities_user ON activities (user_id);
            CREATE INDEX IF NOT EXISTS idx_activities_user_timestamp
                ON activities (user_id, timestamp);
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    async fn upsert_by_id(&self, activity: &Activity) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO activities (id, user_id, timestamp, type, body, is_special)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                timestamp = excluded.timestamp,
                type = excluded.type,
                body = excluded.body,
                is_special = excluded.is_special
            "#,
            params![
                activity.id,
                activity.user_id,
                timestamp_to_db(activity.timestamp),
                activity.kind.as_str(),
                activity.body,
                activity.is_special,
            ],
        )?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Activity>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM activities WHERE id = ?1"),
                params![id],
                raw_activity_from_row,
            )
            .optional()?;
        row.map(RawActivityRow::into_activity).transpose()
    }

    async fn count(&self) -> StoreResult<u64> {
        let connection = self.open_connection()?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))?;
        i64_to_u64("count", count)
    }

    async fn daily_counts(
        &self,
        user_id: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> StoreResult<BTreeMap<NaiveDate, u64>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(
            r#"
            SELECT date(timestamp) AS day, COUNT(*)
            FROM activities
            WHERE user_id = ?1 AND date(timestamp) BETWEEN ?2 AND ?3
            GROUP BY day
            ORDER BY day
            "#,
        )?;
        let rows = statement.query_map(
            params![
                user_id,
                since.format(DATE_FORMAT).to_string(),
                until.format(DATE_FORMAT).to_string()
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (day, count) = row?;
            let day = NaiveDate::parse_from_str(&day, DATE_FORMAT)?;
            counts.insert(day, i64_to_u64("count", count)?);
        }
        Ok(counts)
    }

    async fn total_for_user(&self, user_id: &str) -> StoreResult<u64> {
        let connection = self.open_connection()?;
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM activities WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        i64_to_u64("count", count)
    }

    async fn activities_on(&self, user_id: &str, date: NaiveDate) -> StoreResult<Vec<Activity>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM activities \
             WHERE user_id = ?1 AND date(timestamp) = ?2 \
             ORDER BY timestamp, id"
        ))?;
        let rows = statement.query_map(
            params![user_id, date.format(DATE_FORMAT).to_string()],
            raw_activity_from_row,
        )?;

        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?.into_activity()?);
        }
        Ok(activities)
    }
}

struct RawActivityRow {
    id: String,
    user_id: String,
    timestamp: String,
    kind: String,
    body: String,
    is_special: bool,
}

impl RawActivityRow {
    fn into_activity(self) -> StoreResult<Activity> {
        let kind = self.kind.parse::<ActivityKind>().map_err(|error| {
            ActivityStoreError::InvalidPersistedValue {
                field: "type",
                value: error.0,
            }
        })?;
        Ok(Activity {
            id: self.id,
            user_id: self.user_id,
            timestamp: timestamp_from_db(&self.timestamp)?,
            kind,
            body: self.body,
            is_special: self.is_special,
        })
    }
}

fn raw_activity_from_row(row: &Row<'_>) -> rusqlite::Result<RawActivityRow> {
    Ok(RawActivityRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        timestamp: row.get(2)?,
        kind: row.get(3)?,
        body: row.get(4)?,
        is_special: row.get(5)?,
    })
}

fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn timestamp_from_db(value: &str) -> StoreResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn i64_to_u64(field: &'static str, value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| ActivityStoreError::InvalidPersistedValue {
        field,
        value: value.to_string(),
    })
}
