use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Supply counters read from the market contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyInfo {
    pub total_supply: U256,
    pub total_sold: U256,
}

/// Live curve snapshot. Read fresh before each use, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveState {
    /// Spot price in native units per token.
    pub current_price: Decimal,
    pub total_supply: U256,
    pub total_sold: U256,
    /// Native currency held by the market contract (backs sell proceeds).
    pub contract_native_balance: U256,
}

impl CurveState {
    /// Fully-diluted valuation at spot, in native units.
    pub fn market_cap(&self) -> Decimal {
        crate::units::from_wei(self.total_supply)
            .map(|supply| supply * self.current_price)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Balances of the connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balances {
    pub native: U256,
    pub token: U256,
}
