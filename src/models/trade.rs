use alloy::primitives::TxHash;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{Balances, TradeDirection};

/// User intent to trade. Validated against live balances before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub direction: TradeDirection,
    pub token_amount: Decimal,
}

/// Trade executor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStage {
    #[default]
    Idle,
    Validating,
    Simulating,
    Submitting,
    Confirming,
    Succeeded,
    Failed,
}

impl fmt::Display for TradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeStage::Idle => "idle",
            TradeStage::Validating => "validating",
            TradeStage::Simulating => "simulating",
            TradeStage::Submitting => "submitting",
            TradeStage::Confirming => "confirming",
            TradeStage::Succeeded => "succeeded",
            TradeStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a submitted transaction was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Confirmation {
    /// A successful receipt was observed.
    Receipt { block_number: Option<u64> },
    /// Submitted, but the receipt could not be retrieved. Most likely landed.
    Unverified,
}

/// Outcome of a trade that reached the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub id: Uuid,
    pub tx_hash: TxHash,
    pub direction: TradeDirection,
    pub token_amount: Decimal,
    pub confirmation: Confirmation,
    /// Balances re-read after confirmation, when the read succeeded.
    pub balances_after: Option<Balances>,
}

impl TradeReceipt {
    pub fn is_verified(&self) -> bool {
        matches!(self.confirmation, Confirmation::Receipt { .. })
    }
}
