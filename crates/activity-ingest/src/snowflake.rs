//! Timestamp to snowflake-id conversion for time-bounded cursors.
//!
//! A snowflake id stores milliseconds since a source epoch above
//! [`SNOWFLAKE_SEQUENCE_BITS`] low-order worker/sequence bits. The cursor for
//! instant `t` is the smallest id any event at `t` could carry, so it is
//! above every id issued before `t` and not above any id issued after it.

use chrono::{DateTime, Utc};

/// 2015-01-01T00:00:00Z, the Discord snowflake epoch.
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

pub const SNOWFLAKE_SEQUENCE_BITS: u32 = 22;

/// Snowflake layout of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeCodec {
    epoch_ms: i64,
}

impl SnowflakeCodec {
    pub const DISCORD: Self = Self::new(DISCORD_EPOCH_MS);

    pub const fn new(epoch_ms: i64) -> Self {
        Self { epoch_ms }
    }

    /// Numeric cursor for `at`. Instants before the epoch clamp to zero.
    pub fn id_for_time(&self, at: DateTime<Utc>) -> u64 {
        let offset_ms = at.timestamp_millis().saturating_sub(self.epoch_ms);
        let Ok(offset_ms) = u64::try_from(offset_ms) else {
            return 0;
        };
        offset_ms
            .checked_shl(SNOWFLAKE_SEQUENCE_BITS)
            .filter(|id| id >> SNOWFLAKE_SEQUENCE_BITS == offset_ms)
            .unwrap_or(u64::MAX)
    }

    /// Decimal cursor string, as the APIs expect in `before`/`after`.
    pub fn cursor_for_time(&self, at: DateTime<Utc>) -> String {
        self.id_for_time(at).to_string()
    }
}

/// Compares two snowflake ids numerically, falling back to text order for
/// values that do not parse.
pub fn compare_snowflakes(left: &str, right: &str) -> std::cmp::Ordering {
    match (left.trim().parse::<u128>(), right.trim().parse::<u128>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        _ => left.cmp(right),
    }
}
