//! Time utilities.
//!
//! Every timestamp this crate stores or compares is epoch milliseconds
//! (UTC) as an `i64`. Cursors, cooldown deadlines, and request expiry all
//! share that unit, so there is exactly one clock read path.

use std::time::Duration;

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Returns the epoch-millisecond timestamp `duration` from now.
///
/// Saturates instead of wrapping if handed an absurd duration.
pub fn millis_after(duration: Duration) -> i64 {
    now_timestamp_millis().saturating_add(duration.as_millis() as i64)
}
