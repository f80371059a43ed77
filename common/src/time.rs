// Time types used across the project.
// Wire timestamps are signed 64-bit nanoseconds since the Unix epoch so the
// time exchange can express negative offsets without wrapping.

use std::time::{SystemTime, UNIX_EPOCH};

// Nanosecond timestamps, as carried by handshake and time packets
pub type TimestampNanos = i64;

// Millis timestamps used for coarse bookkeeping (head block age, timers)
pub type TimestampMillis = u64;

// Seconds timestamps used to determine it using its type
pub type TimestampSeconds = u64;

#[inline]
pub fn get_current_time_in_nanos() -> TimestampNanos {
    let start = SystemTime::now();
    start
        .duration_since(UNIX_EPOCH)
        .expect("Incorrect time returned from system clock")
        .as_nanos() as TimestampNanos
}

// Return timestamp in milliseconds
// We cast it to u64 as we have plenty of time before it overflows
pub fn get_current_time_in_millis() -> TimestampMillis {
    let start = SystemTime::now();
    start
        .duration_since(UNIX_EPOCH)
        .expect("Incorrect time returned from system clock")
        .as_millis() as TimestampMillis
}

// Return timestamp in seconds
pub fn get_current_time_in_seconds() -> TimestampSeconds {
    get_current_time_in_millis() / 1000
}
