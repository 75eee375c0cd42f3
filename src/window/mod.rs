/// Sliding-window statistics engine

pub mod aggregator;
pub mod bucket;
pub mod clock;

pub use aggregator::Aggregator;
pub use bucket::{SecondBucket, StatisticsAccumulator};
pub use clock::{is_within_window, second_of_minute, Clock, ManualClock, SystemClock};
