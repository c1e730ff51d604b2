//! Timestamp utilities

use chrono::{DateTime, Datelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// True if both instants fall in the same UTC calendar month of the same year
pub fn same_calendar_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(1500), Duration::from_millis(1500));
        assert_eq!(millis_to_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_same_calendar_month() {
        let jan31 = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let feb1 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let jan1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next_jan = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();

        assert!(same_calendar_month(jan1, jan31));
        assert!(!same_calendar_month(jan31, feb1));
        assert!(!same_calendar_month(jan1, next_jan));
    }
}
