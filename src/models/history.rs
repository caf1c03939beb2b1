use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

/// Chart window. The chain has no timestamp index, so each window maps to a
/// fixed block lookback instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    OneWeek,
    #[serde(rename = "30d")]
    OneMonth,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::OneHour,
        Timeframe::OneDay,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
    ];

    /// Number of blocks to look back, assuming ~2s blocks.
    pub fn lookback_blocks(&self) -> u64 {
        match self {
            Timeframe::OneHour => 1_800,
            Timeframe::OneDay => 43_200,
            Timeframe::OneWeek => 302_400,
            Timeframe::OneMonth => 1_296_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "24h",
            Timeframe::OneWeek => "7d",
            Timeframe::OneMonth => "30d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1h" => Ok(Timeframe::OneHour),
            "24h" | "1d" => Ok(Timeframe::OneDay),
            "7d" | "1w" => Ok(Timeframe::OneWeek),
            "30d" | "1m" => Ok(Timeframe::OneMonth),
            other => Err(format!("unknown timeframe: {other}")),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chart data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    #[default]
    Line,
    Candles,
}

impl FromStr for ChartMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "line" => Ok(ChartMode::Line),
            "candles" | "candle" | "ohlc" => Ok(ChartMode::Candles),
            other => Err(format!("unknown chart mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp_millis: i64,
    pub price: Decimal,
}

/// OHLC summary of one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub bucket_start: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "data", rename_all = "lowercase")]
pub enum PriceSeries {
    Line(Vec<PricePoint>),
    Candles(Vec<Candle>),
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        match self {
            PriceSeries::Line(points) => points.len(),
            PriceSeries::Candles(candles) => candles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent price in the series.
    pub fn last_price(&self) -> Option<Decimal> {
        match self {
            PriceSeries::Line(points) => points.last().map(|p| p.price),
            PriceSeries::Candles(candles) => candles.last().map(|c| c.close),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw trade logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeLogKind {
    Purchase,
    Sale,
}

impl fmt::Display for TradeLogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeLogKind::Purchase => write!(f, "purchase"),
            TradeLogKind::Sale => write!(f, "sale"),
        }
    }
}

/// One decoded purchase / sale event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLog {
    pub kind: TradeLogKind,
    pub block_number: u64,
    /// Post-trade spot price, 18-decimal native units per token.
    pub price: U256,
}
