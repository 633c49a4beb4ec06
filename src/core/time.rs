//! Time representation shared by both players and the common timeline.
//! All values are nanoseconds (i64). Negative values only appear as
//! intermediate results of timeline conversions and are never sent to a player.

/// Time in nanoseconds.
pub type Time = i64;

/// Time constants for conversions
pub mod constants {
    use super::Time;

    pub const NANOS_PER_SECOND: Time = 1_000_000_000;
    pub const NANOS_PER_MILLI: Time = 1_000_000;
}

/// Time zero constant
pub const ZERO: Time = 0;

/// Convert seconds (f64) to nanoseconds (i64)
#[inline]
pub fn from_seconds(seconds: f64) -> Time {
    (seconds * constants::NANOS_PER_SECOND as f64).round() as Time
}

/// Convert milliseconds to nanoseconds
#[inline]
pub fn from_millis(millis: i64) -> Time {
    millis * constants::NANOS_PER_MILLI
}

/// Divide a time by a scale factor, rounding to the nearest nanosecond.
#[inline]
pub fn unscale(nanos: Time, scale: f64) -> Time {
    (nanos as f64 / scale).round() as Time
}

/// Multiply a time by a scale factor, rounding to the nearest nanosecond.
#[inline]
pub fn rescale(nanos: Time, scale: f64) -> Time {
    (nanos as f64 * scale).round() as Time
}

/// Clamp a time into `[min, max]`. A degenerate range collapses to `min`.
#[inline]
pub fn clamp(nanos: Time, min: Time, max: Time) -> Time {
    if max < min {
        return min;
    }
    nanos.clamp(min, max)
}
