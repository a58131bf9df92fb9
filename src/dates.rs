//! Event date parsing for the `YYYY-mm-DD HH:MM:SS[.S]` log wire format.

use chrono::NaiveDateTime;

/// Timestamp format carrying fractional seconds (`2015-05-12 09:30:15.0`).
const WITH_FRACTION: &str = "%Y-%m-%d %H:%M:%S%.f";
/// Timestamp format without fractional seconds (`2015-05-12 09:30:15`).
const WITHOUT_FRACTION: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an event timestamp as it appears in the delimited logs.
pub fn parse_event_date(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, WITH_FRACTION)
        .or_else(|_| NaiveDateTime::parse_from_str(value, WITHOUT_FRACTION))
}
