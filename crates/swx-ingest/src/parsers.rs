//! Time and value parsers shared by every record mapper
//!
//! All functions here are pure. Apart from [`parse_timestamp`], none of them
//! fail: a value that cannot be coerced degrades to `0` (the `bounded`
//! variants) or `None` (the `optional` variants). Surrounding whitespace is
//! ignored, and a blank field counts as empty.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

/// A timestamp field matched none of the accepted formats
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("Unparseable timestamp: '{0}'")]
    Unparseable(String),
}

/// Naive date-time layouts tried after RFC 3339, in order. Values are taken as UTC.
const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
    // NOAA feeds also emit these
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a timestamp field
///
/// Formats are tried in a fixed order and the first match wins:
///
/// 1. RFC 3339 with offset (`2024-06-01T00:00:00+02:00`, `...Z`)
/// 2. Zulu date-time without offset digits (`2024-06-01T00:00:00Z`)
/// 3. Local date-time (`2024-06-01T00:00:00`), taken as UTC
/// 4. Date only (`2024-06-01`), midnight UTC
///
/// Fractional seconds and a space separator are accepted as well.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = s.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| TimestampError::Unparseable(s.to_string()))
}

/// Parse a strict `YYYY-MM-DD` calendar date (zero-padded, no surrounding text)
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Optional timestamp: empty or unparseable -> `None`
pub fn parse_optional_timestamp(s: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(s).ok()
}

fn parse_integer<T: TryFrom<i64>>(s: &str) -> Option<T> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok().and_then(|v| T::try_from(v).ok())
}

/// 8-bit integer with silent fallback
///
/// Empty, unparseable and out-of-range (`[-128, 127]`) input all yield `0`.
pub fn parse_bounded_i8(s: &str) -> i8 {
    parse_integer(s).unwrap_or(0)
}

/// 16-bit integer with silent fallback to `0`
pub fn parse_bounded_i16(s: &str) -> i16 {
    parse_integer(s).unwrap_or(0)
}

/// 8-bit integer; empty, unparseable or out of range -> `None`
pub fn parse_optional_i8(s: &str) -> Option<i8> {
    parse_integer(s)
}

/// 16-bit integer; empty, unparseable or out of range -> `None`
pub fn parse_optional_i16(s: &str) -> Option<i16> {
    parse_integer(s)
}

pub fn parse_optional_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse().ok()
}

pub fn parse_optional_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Empty -> `None`, anything else verbatim
pub fn parse_optional_string(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
