//! Timestamp formatting helpers.
//!
//! All persisted and wire timestamps are RFC 3339 with offset. Storage uses
//! a fixed microsecond precision so the TEXT column ordering used by the
//! modified-after indexes matches chronological ordering.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};

/// Format a timestamp for storage and wire use.
///
/// Fixed-width microsecond precision, `+00:00` offset.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parse a stored or wire timestamp.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("Invalid timestamp {s:?}: {e}")))
}

/// Parse an optional stored timestamp.
pub fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(&s)).transpose()
}
