//! Clock injection and timestamp parsing
//!
//! Storage uses UTC unix seconds. The vendor reports wall-clock times without an
//! offset; those are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::sync::Arc;

/// Timestamp source (swapped for a fixed value in tests)
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp())
}

pub fn fixed_clock(ts: i64) -> Clock {
    Arc::new(move || ts)
}

/// Parse a query bound
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS[.f]`, `YYYY-MM-DD HH:MM:SS` or a bare
/// date. A bare date as an upper bound covers the whole day.
pub fn parse_query_time(value: &str, is_end: bool) -> Result<i64, String> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(naive.and_utc().timestamp());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            let start = midnight.and_utc().timestamp();
            return Ok(if is_end { start + 86_399 } else { start });
        }
    }

    Err(format!("invalid timestamp: {}", value))
}

/// Combine a vendor date (`YYYY-MM-DD`) and time-of-day (`HH:MM[:SS]`)
pub fn vendor_timestamp(date: NaiveDate, time_of_day: &str) -> Option<i64> {
    let time = NaiveTime::parse_from_str(time_of_day, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time_of_day, "%H:%M"))
        .ok()?;
    Some(date.and_time(time).and_utc().timestamp())
}

/// Parse a vendor local datetime such as `2025-06-01T22:14:30.000`
pub fn parse_vendor_datetime(value: &str) -> Option<i64> {
    parse_query_time(value, false).ok()
}

pub fn utc_date(ts: i64) -> Option<NaiveDate> {
    Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}

/// RFC 3339 rendering used in API responses
pub fn format_timestamp(ts: i64) -> String {
    match Utc.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        None => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_query_time("1970-01-01T00:01:00Z", false).unwrap(), 60);
        assert_eq!(parse_query_time("1970-01-01T00:01:00", false).unwrap(), 60);
        assert_eq!(parse_query_time("1970-01-01 00:01:00", false).unwrap(), 60);
        assert_eq!(parse_query_time("1970-01-02", false).unwrap(), 86_400);
        assert_eq!(parse_query_time("1970-01-02", true).unwrap(), 86_400 + 86_399);
        assert!(parse_query_time("yesterday", false).is_err());
    }

    #[test]
    fn test_vendor_timestamp() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        assert_eq!(vendor_timestamp(date, "00:00:30"), Some(86_430));
        assert_eq!(vendor_timestamp(date, "00:01"), Some(86_460));
        assert_eq!(vendor_timestamp(date, "25:00"), None);
    }

    #[test]
    fn test_format_round_trip() {
        let ts = 1_717_200_000;
        assert_eq!(parse_query_time(&format_timestamp(ts), false).unwrap(), ts);
        assert_eq!(utc_date(86_399), NaiveDate::from_ymd_opt(1970, 1, 1));
    }
}
