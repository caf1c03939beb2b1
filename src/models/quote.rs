use alloy::primitives::U256;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TradeDirection;

/// Which strategy produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    /// The contract's own cost / proceeds function.
    Contract,
    /// Local linear approximation of the curve.
    Fallback,
}

impl QuoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSource::Contract => "contract",
            QuoteSource::Fallback => "fallback",
        }
    }
}

/// Price of a candidate trade. Superseded, never mutated, when the input changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeQuote {
    pub direction: TradeDirection,
    /// Token amount the quote was computed for.
    pub amount_in: Decimal,
    /// Buy cost or sell proceeds, 18-decimal native units.
    pub cost_or_proceeds: U256,
    /// Deviation of the average execution price from spot, in `[0, 100]`.
    pub price_impact_percent: f64,
    pub source: QuoteSource,
    pub quoted_at: DateTime<Utc>,
}

impl TradeQuote {
    /// Cost or proceeds in native units.
    pub fn native_value(&self) -> Decimal {
        crate::units::from_wei(self.cost_or_proceeds).unwrap_or(Decimal::ZERO)
    }

    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.quoted_at <= ttl
    }
}

impl fmt::Display for TradeQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Quote: {} {} for {} native (impact {:.2}%, {})",
            self.direction,
            self.amount_in,
            self.native_value(),
            self.price_impact_percent,
            self.source.as_str(),
        )
    }
}
