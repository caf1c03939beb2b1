use crate::models::{Candle, PricePoint};

/// Group time-ordered points into `buckets` equal-width time buckets spanning
/// `[first.timestamp, last.timestamp]`. Buckets without points are dropped.
pub fn build_candles(points: &[PricePoint], buckets: usize) -> Vec<Candle> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let buckets = buckets.max(1) as i64;
    let min_ts = first.timestamp_millis;
    let span = (last.timestamp_millis - min_ts).max(0);
    // ceil so the last point lands inside the final bucket
    let width = ((span + buckets - 1) / buckets).max(1);

    let mut candles: Vec<Candle> = Vec::new();
    let mut current_index: Option<i64> = None;

    for point in points {
        let index = ((point.timestamp_millis - min_ts).max(0) / width).min(buckets - 1);

        match candles.last_mut() {
            Some(candle) if current_index == Some(index) => {
                candle.high = candle.high.max(point.price);
                candle.low = candle.low.min(point.price);
                candle.close = point.price;
            }
            _ => {
                candles.push(Candle {
                    bucket_start: min_ts + index * width,
                    open: point.price,
                    high: point.price,
                    low: point.price,
                    close: point.price,
                });
                current_index = Some(index);
            }
        }
    }

    candles
}
