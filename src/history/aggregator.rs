use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{ChainContext, ChainReader, ChainResult};
use crate::errors::ChainError;
use crate::models::{ChartMode, PricePoint, PriceSeries, Timeframe, TradeLog, TradeLogKind};
use crate::units;

use super::candles::build_candles;
use super::downsample::{downsample, merge_by_block, TimestampAnchors, TARGET_BUCKETS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Points per line chart / candles per OHLC chart (default 60).
    pub target_buckets: usize,
    /// Maximum block span of a single log request (default 10,000).
    pub max_log_range: u64,
    /// Span of the flat series shown when no trades exist (default 1h).
    pub synthetic_window: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            target_buckets: TARGET_BUCKETS,
            max_log_range: 10_000,
            synthetic_window: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("chain unavailable: {0}")]
    ChainUnavailable(#[from] ChainError),
}

/// Builds chart series from raw purchase / sale logs.
pub struct HistoryAggregator {
    reader: Arc<dyn ChainReader>,
    config: HistoryConfig,
}

impl HistoryAggregator {
    pub fn new(reader: Arc<dyn ChainReader>, config: HistoryConfig) -> Self {
        Self { reader, config }
    }

    /// Price series for `timeframe`.
    ///
    /// Log or timestamp failures degrade to a flat series at the current price;
    /// an error is returned only when that price cannot be read either.
    pub async fn history(
        &self,
        ctx: &ChainContext,
        timeframe: Timeframe,
        mode: ChartMode,
    ) -> Result<PriceSeries, HistoryError> {
        match self.series_from_logs(ctx, timeframe, mode).await {
            Ok(Some(series)) => {
                counter!("history_builds_total").increment(1);
                tracing::debug!(
                    market = %ctx.market,
                    timeframe = %timeframe,
                    points = series.len(),
                    "Price history built from logs"
                );
                Ok(series)
            }
            Ok(None) => {
                tracing::debug!(
                    market = %ctx.market,
                    timeframe = %timeframe,
                    "No trades in window, showing flat series"
                );
                self.flat_series(ctx, mode).await
            }
            Err(e) => {
                tracing::warn!(
                    market = %ctx.market,
                    timeframe = %timeframe,
                    error = %e,
                    "Price history fetch failed, showing flat series"
                );
                self.flat_series(ctx, mode).await
            }
        }
    }

    async fn series_from_logs(
        &self,
        ctx: &ChainContext,
        timeframe: Timeframe,
        mode: ChartMode,
    ) -> ChainResult<Option<PriceSeries>> {
        let to_block = self.reader.current_block_number().await?;
        let from_block = to_block.saturating_sub(timeframe.lookback_blocks());

        let (purchases, sales) = tokio::try_join!(
            self.fetch_logs(ctx.market, TradeLogKind::Purchase, from_block, to_block),
            self.fetch_logs(ctx.market, TradeLogKind::Sale, from_block, to_block),
        )?;

        let events = merge_by_block(purchases, sales);
        let (Some(first), Some(last)) = (events.first(), events.last()) else {
            return Ok(None);
        };

        let series = match mode {
            ChartMode::Line => {
                let buckets = downsample(&events, self.config.target_buckets);
                let (Some(head), Some(tail)) = (buckets.first(), buckets.last()) else {
                    return Ok(None);
                };
                let anchors = self.anchors(head.head_block, tail.head_block).await?;

                let mut points = buckets
                    .iter()
                    .map(|bucket| -> ChainResult<PricePoint> {
                        Ok(PricePoint {
                            timestamp_millis: anchors.at(bucket.head_block),
                            price: units::from_wei(bucket.price)?,
                        })
                    })
                    .collect::<ChainResult<Vec<_>>>()?;
                points.sort_by_key(|p| p.timestamp_millis);
                PriceSeries::Line(points)
            }
            ChartMode::Candles => {
                let anchors = self.anchors(first.block_number, last.block_number).await?;
                let points = events
                    .iter()
                    .map(|event| -> ChainResult<PricePoint> {
                        Ok(PricePoint {
                            timestamp_millis: anchors.at(event.block_number),
                            price: units::from_wei(event.price)?,
                        })
                    })
                    .collect::<ChainResult<Vec<_>>>()?;
                PriceSeries::Candles(build_candles(&points, self.config.target_buckets))
            }
        };

        Ok(Some(series))
    }

    /// Fetch logs of one kind, split into requests of at most `max_log_range`
    /// blocks each.
    async fn fetch_logs(
        &self,
        market: Address,
        kind: TradeLogKind,
        from_block: u64,
        to_block: u64,
    ) -> ChainResult<Vec<TradeLog>> {
        let range = self.config.max_log_range.max(1);
        let mut logs = Vec::new();
        let mut start = from_block;

        while start <= to_block {
            let end = start.saturating_add(range - 1).min(to_block);
            let chunk = self.reader.trade_logs(market, kind, start, end).await?;
            logs.extend(chunk);
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }

        tracing::debug!(%kind, from_block, to_block, count = logs.len(), "Fetched trade logs");
        Ok(logs)
    }

    async fn anchors(&self, first_block: u64, last_block: u64) -> ChainResult<TimestampAnchors> {
        if first_block == last_block {
            let ts = self.reader.block_timestamp(first_block).await?;
            return Ok(TimestampAnchors::single(first_block, secs_to_millis(ts)));
        }

        let (first_ts, last_ts) = tokio::try_join!(
            self.reader.block_timestamp(first_block),
            self.reader.block_timestamp(last_block),
        )?;

        Ok(TimestampAnchors {
            first_block,
            first_millis: secs_to_millis(first_ts),
            last_block,
            last_millis: secs_to_millis(last_ts),
        })
    }

    async fn flat_series(&self, ctx: &ChainContext, mode: ChartMode) -> Result<PriceSeries, HistoryError> {
        let price_raw = self.reader.current_price(ctx.market).await?;
        let price = units::from_wei(price_raw).map_err(ChainError::from)?;
        let window_ms = self.config.synthetic_window.as_millis() as i64;
        let points = flat_points(price, Utc::now().timestamp_millis(), window_ms);

        counter!("history_synthetic_total").increment(1);

        Ok(match mode {
            ChartMode::Line => PriceSeries::Line(points),
            ChartMode::Candles => {
                PriceSeries::Candles(build_candles(&points, self.config.target_buckets))
            }
        })
    }
}

/// Two points at `price`, `window_ms` apart, ending at `now_ms`.
pub fn flat_points(price: Decimal, now_ms: i64, window_ms: i64) -> Vec<PricePoint> {
    vec![
        PricePoint {
            timestamp_millis: now_ms - window_ms,
            price,
        },
        PricePoint {
            timestamp_millis: now_ms,
            price,
        },
    ]
}

fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX / 1000) * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_points_span_window() {
        let points = flat_points(Decimal::ONE, 10_000_000, 3_600_000);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].timestamp_millis - points[0].timestamp_millis, 3_600_000);
        assert_eq!(points[0].price, points[1].price);
    }

    #[test]
    fn test_secs_to_millis() {
        assert_eq!(secs_to_millis(1_700_000_000), 1_700_000_000_000);
    }
}
