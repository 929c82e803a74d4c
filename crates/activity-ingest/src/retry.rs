use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Delay used when a throttled response carries no usable hint.
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(1);

/// Retry hints above this value are milliseconds, otherwise seconds.
pub const RETRY_AFTER_MILLIS_THRESHOLD: f64 = 1_000.0;

/// Parses a retry hint whose unit is ambiguous (`"2"`, `"0.25"`, `"1500"`).
pub fn retry_after_from_str(raw: &str) -> Option<Duration> {
    let value = raw.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value > RETRY_AFTER_MILLIS_THRESHOLD {
        value
    } else {
        value * 1_000.0
    };
    Some(Duration::from_millis(millis.round() as u64))
}

pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    retry_after_from_str(raw)
}

/// Delay until an `x-ratelimit-reset` epoch-seconds deadline.
pub fn parse_ratelimit_reset(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let raw = headers.get("x-ratelimit-reset")?.to_str().ok()?.trim();
    let reset_at = raw.parse::<i64>().ok()?;
    let delay_ms = reset_at
        .saturating_mul(1_000)
        .saturating_sub(now.timestamp_millis());
    Some(Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0)))
}

/// How the paginator reacts to throttling. Unbounded by default: a
/// persistent throttle blocks the run until its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub max_retries: Option<usize>,
    pub default_delay: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            default_delay: DEFAULT_THROTTLE_DELAY,
        }
    }
}

impl ThrottlePolicy {
    pub fn with_max_retries(max_retries: Option<usize>) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// True when one more retry is permitted after `retries_so_far`.
    pub fn allows_retry(&self, retries_so_far: usize) -> bool {
        match self.max_retries {
            Some(max_retries) => retries_so_far < max_retries,
            None => true,
        }
    }

    pub fn delay_for(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.default_delay)
    }
}

pub fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{
        parse_ratelimit_reset, parse_retry_after, retry_after_from_str, truncate_for_error,
        ThrottlePolicy, DEFAULT_THROTTLE_DELAY,
    };
    use chrono::{TimeZone, Utc};
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::time::Duration;

    #[test]
    fn unit_retry_after_above_threshold_is_milliseconds() {
        assert_eq!(
            retry_after_from_str("1500"),
            Some(Duration::from_millis(1_500))
        );
    }

    #[test]
    fn unit_retry_after_at_or_below_threshold_is_seconds() {
        assert_eq!(retry_after_from_str("2"), Some(Duration::from_secs(2)));
        assert_eq!(
            retry_after_from_str("0.25"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            retry_after_from_str("1000"),
            Some(Duration::from_secs(1_000))
        );
    }

    #[test]
    fn unit_retry_after_rejects_invalid_values() {
        assert_eq!(retry_after_from_str(""), None);
        assert_eq!(retry_after_from_str("soon"), None);
        assert_eq!(retry_after_from_str("-1"), None);
        assert_eq!(retry_after_from_str("NaN"), None);
    }

    #[test]
    fn functional_parse_retry_after_reads_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static(" 3 "));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
    }

    #[test]
    fn functional_parse_ratelimit_reset_measures_from_now() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut headers = HeaderMap::new();
        let reset = (now.timestamp() + 5).to_string();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&reset).expect("header value"),
        );
        assert_eq!(
            parse_ratelimit_reset(&headers, now),
            Some(Duration::from_secs(5))
        );

        let past = (now.timestamp() - 5).to_string();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&past).expect("header value"),
        );
        assert_eq!(parse_ratelimit_reset(&headers, now), Some(Duration::ZERO));
    }

    #[test]
    fn unit_throttle_policy_defaults_to_unbounded_retries() {
        let policy = ThrottlePolicy::default();
        assert!(policy.allows_retry(usize::MAX - 1));
        assert_eq!(policy.delay_for(None), DEFAULT_THROTTLE_DELAY);
        assert_eq!(
            policy.delay_for(Some(Duration::from_millis(5))),
            Duration::from_millis(5)
        );

        let capped = ThrottlePolicy::with_max_retries(Some(2));
        assert!(capped.allows_retry(1));
        assert!(!capped.allows_retry(2));
    }

    #[test]
    fn unit_truncate_for_error_bounds_long_bodies() {
        assert_eq!(truncate_for_error("short", 10), "short");
        assert_eq!(truncate_for_error("abcdef", 3), "abc...");
    }
}
