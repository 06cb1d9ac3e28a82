//! Timestamp formats.
//!
//! Stored dates use one fixed layout, `YYYY-MM-DD HH:MM:SS` in UTC, and are
//! re-parsed strictly. Header dates are RFC 2822 with the usual real-world
//! deviations tolerated.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use crate::{Error, Result};

/// Layout of every date column.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const STORAGE_LEN: usize = "2006-01-02 15:04:05".len();

/// Formats a timestamp for storage.
#[must_use]
pub fn to_storage(date: DateTime<Utc>) -> String {
    date.format(STORAGE_FORMAT).to_string()
}

/// Parses a stored timestamp.
///
/// # Errors
///
/// Returns [`Error::Date`] for anything but the exact storage layout,
/// including unpadded fields and trailing text.
pub fn from_storage(text: &str) -> Result<DateTime<Utc>> {
    if text.len() != STORAGE_LEN {
        return Err(Error::Date(format!("{text:?} is not in {STORAGE_FORMAT} layout")));
    }
    NaiveDateTime::parse_from_str(text, STORAGE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Date(format!("{text:?}: {e}")))
}

/// Parses a `Date:` header value, dropping sub-second precision.
///
/// Accepts RFC 2822 with or without the weekday, obsolete zone names, and a
/// trailing `(comment)` such as `(UTC)`.
#[must_use]
pub fn parse_header_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = match value.rfind('(') {
        Some(open) if value.ends_with(')') => value[..open].trim_end(),
        _ => value,
    };

    let parsed = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S %z"))
        .or_else(|_| DateTime::parse_from_str(value, "%d %b %Y %H:%M:%S %z"))
        .ok()?;
    parsed.with_timezone(&Utc).with_nanosecond(0)
}
