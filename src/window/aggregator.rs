/// Sliding 60-second window over transaction amounts
///
/// Transactions are folded into one bucket per second of the minute, so the
/// state never holds more than 60 entries regardless of throughput. A slot is
/// reused one full window later; staleness is checked on every access so the
/// previous cycle never leaks into the current one.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::core::{RecordOutcome, Statistics, Transaction, BUCKET_SLOTS};
use super::bucket::{SecondBucket, StatisticsAccumulator};
use super::clock::{is_within_window, second_of_minute, Clock, SystemClock};

pub struct Aggregator {
    /// Bucket per second of the minute. Sharded locking means writers on
    /// different seconds do not contend on a single lock.
    buckets: DashMap<u8, SecondBucket>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("buckets", &self.buckets.len())
            .field("clock", &self.clock)
            .finish()
    }
}

impl Aggregator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        info!("📊 Initializing sliding window aggregator ({} second slots)", BUCKET_SLOTS);

        Self {
            buckets: DashMap::with_capacity(BUCKET_SLOTS),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Fold a transaction into its second's bucket.
    ///
    /// Transactions at least 60 seconds old are ignored. Timestamps ahead of
    /// the clock are accepted.
    #[instrument(level = "debug", skip(self))]
    pub fn record(&self, transaction: Transaction) -> RecordOutcome {
        let now = self.clock.now_millis();

        if !is_within_window(now, transaction.timestamp) {
            debug!(age_ms = now.saturating_sub(transaction.timestamp), "Transaction outside window, ignoring");
            return RecordOutcome::OutOfWindow;
        }

        self.sweep(now);

        let second = second_of_minute(transaction.timestamp);

        // The entry holds the shard lock, so the staleness check and the
        // merge below are one step for this second.
        match self.buckets.entry(second) {
            Entry::Occupied(mut occupied) => {
                let bucket = occupied.get_mut();
                if bucket.is_fresh(now) {
                    bucket.merge(transaction.amount);
                } else {
                    debug!(second, "Replacing stale bucket");
                    *bucket = SecondBucket::open(&transaction);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SecondBucket::open(&transaction));
            }
        }

        RecordOutcome::Accepted
    }

    /// Statistics over every bucket that is fresh right now.
    ///
    /// Read-only: stale buckets are skipped and left for the next sweep.
    pub fn snapshot(&self) -> Statistics {
        let now = self.clock.now_millis();
        let mut accumulator = StatisticsAccumulator::default();

        for entry in self.buckets.iter() {
            if entry.value().is_fresh(now) {
                accumulator.add(entry.value());
            }
        }

        accumulator.finish()
    }

    /// Remove buckets that fell out of the window, returns how many went.
    ///
    /// Stale keys are found under shard read locks; each removal re-checks
    /// staleness under that key's write lock, so a bucket refreshed in
    /// between is kept. Nothing is write-locked when nothing is stale.
    fn sweep(&self, now_millis: i64) -> usize {
        let stale: Vec<u8> = self
            .buckets
            .iter()
            .filter(|entry| !entry.value().is_fresh(now_millis))
            .map(|entry| *entry.key())
            .collect();

        let removed = stale
            .iter()
            .filter(|&&second| {
                self.buckets
                    .remove_if(&second, |_, bucket| !bucket.is_fresh(now_millis))
                    .is_some()
            })
            .count();

        if removed > 0 {
            debug!(removed, "Evicted stale buckets");
        }
        removed
    }

    /// Point-in-time copy of the buckets that are still fresh
    pub fn buckets(&self) -> BTreeMap<u8, SecondBucket> {
        let now = self.clock.now_millis();
        self.buckets
            .iter()
            .filter(|entry| entry.value().is_fresh(now))
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Stored buckets, stale ones included until the next sweep
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&self) {
        self.buckets.clear();
        info!("🧹 Window cleared");
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::with_system_clock()
    }
}
