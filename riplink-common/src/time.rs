//! Timestamp utilities
//!
//! Persisted timestamps are unix seconds; these helpers keep the
//! conversions in one place.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as unix seconds
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Seconds elapsed since a unix timestamp (negative if it is in the future)
pub fn seconds_since(secs: i64) -> i64 {
    now_unix() - secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_seconds_since_past() {
        let an_hour_ago = now_unix() - 3600;
        let elapsed = seconds_since(an_hour_ago);
        assert!((3600..3610).contains(&elapsed));
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, Duration::from_secs(1));
    }
}
