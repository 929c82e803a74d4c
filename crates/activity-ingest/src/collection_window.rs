//! The trailing time window one ingestion run covers.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{IngestError, IngestResult};

/// Inclusive `[start, end]` range in UTC, derived from whole calendar days
/// in a reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CollectionWindow {
    /// From 00:00:00.000 two days before `now` to 23:59:59.999 one day
    /// before `now`, both in `timezone`.
    pub fn trailing_days(now: DateTime<Utc>, timezone: Tz) -> IngestResult<Self> {
        let today = now.with_timezone(&timezone).date_naive();
        let first_day = today
            .checked_sub_days(Days::new(2))
            .ok_or_else(|| IngestError::InvalidConfig("window start out of range".to_string()))?;
        let last_day = today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| IngestError::InvalidConfig("window end out of range".to_string()))?;

        let start_of_day = NaiveTime::from_hms_opt(0, 0, 0)
            .ok_or_else(|| IngestError::InvalidConfig("invalid start of day".to_string()))?;
        let start = local_instant(timezone, first_day, start_of_day, true)?;
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| IngestError::InvalidConfig("invalid end of day".to_string()))?;
        let end = local_instant(timezone, last_day, end_of_day, false)?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    pub fn is_before_start(&self, at: DateTime<Utc>) -> bool {
        at < self.start
    }
}

fn local_instant(
    timezone: Tz,
    day: NaiveDate,
    time: NaiveTime,
    earliest: bool,
) -> IngestResult<DateTime<Utc>> {
    let local = timezone.from_local_datetime(&day.and_time(time));
    let resolved = if earliest {
        local.earliest()
    } else {
        local.latest()
    };
    resolved
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| {
            IngestError::InvalidConfig(format!(
                "{day} {time} does not exist in timezone {}",
                timezone.name()
            ))
        })
}

/// Parses an IANA zone name such as `Asia/Tokyo`.
pub fn parse_timezone(name: &str) -> IngestResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| IngestError::InvalidConfig(format!("invalid timezone '{name}'")))
}
