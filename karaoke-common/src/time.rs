//! Timestamp utilities
//!
//! Timestamps are persisted as UTC epoch milliseconds so that SQLite
//! ordering and range comparisons are plain integer comparisons.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a timestamp to epoch milliseconds for storage
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert stored epoch milliseconds back to a timestamp
///
/// Out-of-range values map to the Unix epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}
