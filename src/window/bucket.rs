use tracing::warn;

use crate::core::{Statistics, Transaction};
use super::clock::is_within_window;

/// Addition that clamps at `±f64::MAX` instead of overflowing to infinity.
/// Amounts are finite, so partial sums stay finite and JSON-encodable.
#[inline]
fn saturating_add(total: f64, amount: f64) -> f64 {
    let sum = total + amount;
    if sum.is_finite() {
        sum
    } else {
        warn!(total, amount, "Sum overflowed f64, clamping");
        f64::MAX.copysign(sum)
    }
}

/// Partial aggregate for every transaction that landed in one second slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondBucket {
    /// Timestamp of the transaction that opened this bucket; only used to
    /// decide staleness
    pub timestamp: i64,
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl SecondBucket {
    pub fn open(transaction: &Transaction) -> Self {
        Self {
            timestamp: transaction.timestamp,
            count: 1,
            sum: transaction.amount,
            min: transaction.amount,
            max: transaction.amount,
        }
    }

    pub fn merge(&mut self, amount: f64) {
        self.count += 1;
        self.sum = saturating_add(self.sum, amount);
        self.min = self.min.min(amount);
        self.max = self.max.max(amount);
    }

    #[inline]
    pub fn is_fresh(&self, now_millis: i64) -> bool {
        is_within_window(now_millis, self.timestamp)
    }
}

/// Folds fresh buckets into window-wide statistics
#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl StatisticsAccumulator {
    pub fn add(&mut self, bucket: &SecondBucket) {
        self.count += bucket.count;
        self.sum = saturating_add(self.sum, bucket.sum);
        self.min = Some(self.min.map_or(bucket.min, |m| m.min(bucket.min)));
        self.max = Some(self.max.map_or(bucket.max, |m| m.max(bucket.max)));
    }

    pub fn finish(self) -> Statistics {
        if self.count == 0 {
            return Statistics::default();
        }

        Statistics {
            sum: self.sum,
            avg: self.sum / self.count as f64,
            max: self.max.unwrap_or_default(),
            min: self.min.unwrap_or_default(),
            count: self.count,
        }
    }
}
