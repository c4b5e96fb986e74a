//! Time utility functions
//!
//! Timestamps are persisted as microseconds since the Unix epoch (UTC).

use chrono::{DateTime, Duration, DurationRound, Utc};

/// Convert microseconds since Unix epoch to DateTime<Utc>
pub fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(|| {
        tracing::warn!(micros, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Convert DateTime<Utc> to microseconds since Unix epoch
pub fn datetime_to_micros(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

/// Truncate to the start of the containing UTC hour
pub fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.duration_trunc(Duration::hours(1)).unwrap_or(dt)
}

/// Start of the most recent fully elapsed UTC hour
pub fn previous_hour_start(now: DateTime<Utc>) -> DateTime<Utc> {
    truncate_to_hour(now) - Duration::hours(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_micros_round_trip() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap();
        assert_eq!(micros_to_datetime(datetime_to_micros(dt)), dt);
    }

    #[test]
    fn test_micros_out_of_range_falls_back_to_epoch() {
        assert_eq!(micros_to_datetime(i64::MAX), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_truncate_to_hour() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 59, 59).unwrap();
        assert_eq!(
            truncate_to_hour(dt),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_previous_hour_start() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 0, 10, 0).unwrap();
        assert_eq!(
            previous_hour_start(dt),
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap()
        );
    }
}
