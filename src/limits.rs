//! Input-validation bounds. Requests outside these are rejected up front,
//! never silently clamped.

/// Longest bookable service.
pub const MAX_DURATION_MINUTES: u32 = 12 * 60;

/// Longest buffer on either side of a service.
pub const MAX_BUFFER_MINUTES: u32 = 4 * 60;

/// Longest time-off request, inclusive of both end dates.
pub const MAX_TIME_OFF_DAYS: i64 = 365;

/// Max length for free-text notes / reasons.
pub const MAX_NOTES_LEN: usize = 512;
