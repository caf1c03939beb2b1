use alloy::primitives::U256;

use crate::models::TradeLog;

/// Target number of points per chart.
pub const TARGET_BUCKETS: usize = 60;

/// Representative of one group of consecutive events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Block of the first event in the group; anchors the bucket's timestamp.
    pub head_block: u64,
    /// Price of the last event in the group (close-like).
    pub price: U256,
}

/// Merge purchase and sale logs and order them by block number. The sort is
/// stable, so events inside one block keep the order the node returned.
pub fn merge_by_block(purchases: Vec<TradeLog>, sales: Vec<TradeLog>) -> Vec<TradeLog> {
    let mut merged = purchases;
    merged.extend(sales);
    merged.sort_by_key(|log| log.block_number);
    merged
}

/// Reduce `events` (block ordered) to at most `target` buckets.
///
/// Small inputs keep one bucket per event. Larger inputs are split into
/// exactly `target` consecutive groups whose sizes differ by at most one, so
/// no group is larger than `ceil(n / target)`.
pub fn downsample(events: &[TradeLog], target: usize) -> Vec<Bucket> {
    let n = events.len();
    if n == 0 || target == 0 {
        return Vec::new();
    }
    let groups = n.min(target);

    (0..groups)
        .map(|g| {
            let start = g * n / groups;
            let end = (g + 1) * n / groups;
            let group = &events[start..end];
            Bucket {
                head_block: group[0].block_number,
                price: group[group.len() - 1].price,
            }
        })
        .collect()
}

/// Two resolved block timestamps used to place every other block on the time
/// axis by linear interpolation, instead of one lookup per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampAnchors {
    pub first_block: u64,
    pub first_millis: i64,
    pub last_block: u64,
    pub last_millis: i64,
}

impl TimestampAnchors {
    /// Anchors for a single block: every block maps to its timestamp.
    pub fn single(block: u64, millis: i64) -> Self {
        Self {
            first_block: block,
            first_millis: millis,
            last_block: block,
            last_millis: millis,
        }
    }

    /// `t0 + (b - b0) / (bL - b0) * (tL - t0)`
    pub fn at(&self, block: u64) -> i64 {
        if self.last_block <= self.first_block {
            return self.first_millis;
        }
        let block_offset = block as i128 - self.first_block as i128;
        let block_span = (self.last_block - self.first_block) as i128;
        let time_span = self.last_millis as i128 - self.first_millis as i128;
        (self.first_millis as i128 + block_offset * time_span / block_span) as i64
    }
}
