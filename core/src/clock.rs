// Clock — injectable wall clock and the protocol's timestamp format

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp layout stamped into every outgoing message:
/// millisecond precision, UTC, no zone suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock pinned to one instant. Useful for deterministic encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Format Unix milliseconds as `yyyy-MM-ddTHH:mm:ss.fff`.
///
/// Values chrono cannot represent clamp to the Unix epoch.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Parse a stamped time back to Unix milliseconds.
///
/// Accepts the zone-less protocol form (read as UTC) and RFC 3339 with an
/// explicit offset. Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}
