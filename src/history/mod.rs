pub mod aggregator;
pub mod candles;
pub mod downsample;

pub use aggregator::{HistoryAggregator, HistoryConfig, HistoryError};
pub use candles::build_candles;
pub use downsample::{downsample, merge_by_block, TimestampAnchors, TARGET_BUCKETS};
