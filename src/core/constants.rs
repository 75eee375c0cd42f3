/// Length of the statistics window in milliseconds
pub const WINDOW_MILLIS: i64 = 60_000;

/// Number of per-second slots in the window, one per second of a minute
pub const BUCKET_SLOTS: usize = 60;

pub const MILLIS_PER_SECOND: i64 = 1_000;

/// Largest `POST /transactions` body read before rejecting it
pub const MAX_TRANSACTION_BODY_BYTES: usize = 64 * 1024;
