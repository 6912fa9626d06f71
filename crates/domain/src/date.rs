use chrono::{DateTime, SecondsFormat, Utc};

/// Formats an instant as RFC 3339 in UTC with a trailing `Z`.
///
/// The precision is fixed to microseconds so that every encoded timestamp has
/// the same width and the TEXT encoding used by the embedded storage backend
/// compares lexicographically in chronological order.
pub fn to_utc_iso(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses an RFC 3339 timestamp and normalizes it to UTC.
///
/// Naive timestamps without an UTC offset are rejected.
pub fn parse_utc_iso(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|datetime| datetime.with_timezone(&Utc))
}
