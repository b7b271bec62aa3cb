//! Human-facing time formatting and parsing.

use crate::{Error, Result};
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};

/// `HH:MM:SS` for a duration in milliseconds; negative values show as zero
///
/// Hours are not wrapped, so a 50 hour fast reads `50:00:00`.
pub fn format_hms(ms: i64) -> String {
    if ms <= 0 {
        return "00:00:00".into();
    }
    let total_secs = ms / 1000;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Compact `Xh Ym` (or `Ym` under an hour)
pub fn format_duration(ms: i64) -> String {
    if ms <= 0 {
        return "0m".into();
    }
    let total_min = ms / 60_000;
    let h = total_min / 60;
    let m = total_min % 60;
    if h == 0 {
        format!("{}m", m)
    } else {
        format!("{}h {}m", h, m)
    }
}

/// Parse a user-supplied instant
///
/// Accepted forms:
/// - RFC 3339 (`2024-03-10T08:30:00+02:00`)
/// - date and minute without zone (`2024-03-10T08:30` or `2024-03-10 08:30`), read in `tz`
/// - integer epoch milliseconds
pub fn parse_timestamp<Tz: TimeZone>(input: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(ms) = input.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| Error::InvalidTime(format!("{} is out of range", input)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, pattern) {
            return match tz.from_local_datetime(&naive) {
                LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
                // Repeated wall-clock time after a DST change: take the earlier
                LocalResult::Ambiguous(first, _) => Ok(first.with_timezone(&Utc)),
                LocalResult::None => Err(Error::InvalidTime(format!(
                    "{} does not exist in the local time zone",
                    input
                ))),
            };
        }
    }

    Err(Error::InvalidTime(format!(
        "could not parse '{}' (use RFC 3339, YYYY-MM-DDTHH:MM or epoch milliseconds)",
        input
    )))
}
