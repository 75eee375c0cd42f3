/// Time source for the sliding window

use chrono::Utc;
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::core::{MILLIS_PER_SECOND, WINDOW_MILLIS};

/// Supplies "now" as epoch milliseconds
pub trait Clock: Send + Sync + Debug {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Settable clock, shared between a test and the aggregator under test
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Second of the minute (0..=59) that `timestamp_millis` falls in
#[inline]
pub fn second_of_minute(timestamp_millis: i64) -> u8 {
    timestamp_millis
        .div_euclid(MILLIS_PER_SECOND)
        .rem_euclid(60) as u8
}

/// `now - timestamp < 60s`. One-sided: timestamps after `now` pass.
#[inline]
pub fn is_within_window(now_millis: i64, timestamp_millis: i64) -> bool {
    now_millis.saturating_sub(timestamp_millis) < WINDOW_MILLIS
}
