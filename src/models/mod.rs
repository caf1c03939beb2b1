pub mod curve;
pub mod history;
pub mod quote;
pub mod trade;

pub use curve::{Balances, CurveState, SupplyInfo};
pub use history::{Candle, ChartMode, PricePoint, PriceSeries, Timeframe, TradeLog, TradeLogKind};
pub use quote::{QuoteSource, TradeQuote};
pub use trade::{Confirmation, TradeReceipt, TradeRequest, TradeStage};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// TradeDirection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn from_input(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" | "B" => Some(TradeDirection::Buy),
            "SELL" | "S" => Some(TradeDirection::Sell),
            _ => None,
        }
    }
}

impl FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_input(s).ok_or_else(|| format!("unknown trade direction: {s}"))
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parsing() {
        assert_eq!(TradeDirection::from_input("buy"), Some(TradeDirection::Buy));
        assert_eq!(TradeDirection::from_input(" SELL "), Some(TradeDirection::Sell));
        assert_eq!(TradeDirection::from_input("hold"), None);
        assert_eq!("s".parse::<TradeDirection>(), Ok(TradeDirection::Sell));
    }
}
