//! Wire timestamp codec.
//!
//! Timestamps travel as ISO-8601 UTC strings with at most six fractional
//! digits: `1970-01-01T00:00:01.5Z`. The server keys events by the literal
//! string, so formatting must be byte-exact: a whole-second instant carries
//! no fractional separator at all, and trailing zeros are trimmed.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Error returned when a wire timestamp does not match the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp format: {value:?}")]
pub struct TimestampFormatError {
    /// The string that failed to parse.
    pub value: String,
}

/// Layout of the whole-second portion of a wire timestamp.
const SECONDS_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S";

/// Renders an instant as the service's UTC wire string.
///
/// Sub-second digits appear only when the microsecond component is
/// non-zero, and trailing zeros are trimmed: 1.5 seconds renders as
/// `…T00:00:01.5Z`, never `…T00:00:01.500000Z`. Precision beyond
/// microseconds is truncated.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    let mut out = timestamp.format(SECONDS_LAYOUT).to_string();
    let micros = timestamp.timestamp_subsec_micros();
    if micros != 0 {
        let mut fraction = format!("{micros:06}");
        while fraction.ends_with('0') {
            fraction.pop();
        }
        out.push('.');
        out.push_str(&fraction);
    }
    out.push('Z');
    out
}

/// Parses a wire timestamp, with or without a fractional part.
///
/// The string must be UTC (`Z`-suffixed); offsets are rejected.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampFormatError> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ").map_err(|_| {
        TimestampFormatError {
            value: value.to_string(),
        }
    })?;
    Ok(Utc.from_utc_datetime(&naive))
}
