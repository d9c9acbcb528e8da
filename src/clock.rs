//! Time formatting in the configured incident time zone
//!
//! Incident documents and transcripts show wall-clock times in one fixed zone,
//! never the process-local one.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an IANA zone name (`US/Pacific`, `Asia/Jakarta`, ...)
pub fn parse_zone(raw: &str) -> Result<Tz, String> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| format!("invalid timezone `{}`; expected IANA timezone id", raw))
}

/// RFC 3339 rendering of an instant in `zone`
pub fn format_in_zone(instant: DateTime<Utc>, zone: Tz) -> String {
    instant
        .with_timezone(&zone)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Current time in `zone`
pub fn now_in_zone(zone: Tz) -> String {
    format_in_zone(Utc::now(), zone)
}

/// Render a Slack `ts` token (`<unix seconds>.<sequence>`) as clock time
///
/// Falls back to the raw seconds part when it is not a valid timestamp.
pub fn format_message_ts(ts: &str, zone: Tz) -> String {
    let seconds = ts.split('.').next().unwrap_or_default();
    match seconds.parse::<i64>() {
        Ok(unix) => match Utc.timestamp_opt(unix, 0).single() {
            Some(instant) => format_in_zone(instant, zone),
            None => seconds.to_string(),
        },
        Err(_) => seconds.to_string(),
    }
}
