//! Microsecond timestamp utilities.
//!
//! The whole pipeline speaks **i64 microseconds since Unix epoch**. Raw feed
//! timestamps arrive as decimal strings of microseconds (the portion before
//! `.` is authoritative); trading dates are `YYYY-MM-DD`; output rows format
//! timestamps as UTC datetimes with microsecond precision.

use chrono::{DateTime, NaiveDate, NaiveTime};

pub const US_PER_MS: i64 = 1_000;
pub const US_PER_SEC: i64 = 1_000_000;
pub const US_PER_HOUR: i64 = 3_600 * US_PER_SEC;
pub const US_PER_DAY: i64 = 24 * US_PER_HOUR;

/// Parse a raw server timestamp into microseconds since epoch.
///
/// The feed encodes timestamps as decimal integers of microseconds, sometimes
/// with a fractional tail (`"1543622400123456.0"`); only the portion before
/// the `.` is used. Returns `None` for empty or non-numeric input.
#[inline]
pub fn parse_server_timestamp(raw: &str) -> Option<i64> {
    let head = raw.split('.').next()?.trim();
    if head.is_empty() {
        return None;
    }
    head.parse().ok()
}

/// Parse a `YYYY-MM-DD` trading date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Session start for a trading date, in microseconds since epoch.
///
/// The session begins `offset_hours` before UTC midnight of the date (CME
/// sessions open the prior evening).
pub fn session_start_us(date: NaiveDate, offset_hours: i64) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    midnight.timestamp_micros() - offset_hours * US_PER_HOUR
}

/// Format microseconds since epoch as a UTC `YYYY-MM-DD HH:MM:SS.ffffff`
/// datetime, the representation written to output rows.
pub fn format_us(ts_us: i64) -> String {
    match DateTime::from_timestamp_micros(ts_us) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        None => ts_us.to_string(),
    }
}
