//! Timestamp helpers
//!
//! All Lifeline records carry Unix-millisecond timestamps with an `_ms`
//! suffix. Milliseconds keep response-time arithmetic exact while staying
//! within `u64` for any realistic epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since the Unix epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
