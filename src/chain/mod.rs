pub mod context;
pub mod rpc;

pub use context::ChainContext;
pub use rpc::RpcChain;

use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;

use crate::errors::ChainError;
use crate::models::{SupplyInfo, TradeDirection, TradeLog, TradeLogKind};

pub type ChainResult<T> = Result<T, ChainError>;

/// Read-only view of the market contract and the chain it lives on.
/// All amounts are 18-decimal fixed point.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn current_price(&self, market: Address) -> ChainResult<U256>;

    /// Native cost of buying `amount` tokens, per the contract.
    async fn buy_cost(&self, market: Address, amount: U256) -> ChainResult<U256>;

    /// Native proceeds of selling `amount` tokens, per the contract.
    async fn sell_proceeds(&self, market: Address, amount: U256) -> ChainResult<U256>;

    /// Native-currency balance of any address (account or market contract).
    async fn native_balance(&self, address: Address) -> ChainResult<U256>;

    async fn token_balance(&self, market: Address, account: Address) -> ChainResult<U256>;

    async fn supply(&self, market: Address) -> ChainResult<SupplyInfo>;

    /// Decoded trade events of one kind in `[from_block, to_block]`, in the
    /// order the node returned them.
    async fn trade_logs(
        &self,
        market: Address,
        kind: TradeLogKind,
        from_block: u64,
        to_block: u64,
    ) -> ChainResult<Vec<TradeLog>>;

    /// Block timestamp in seconds.
    async fn block_timestamp(&self, block_number: u64) -> ChainResult<u64>;

    async fn current_block_number(&self) -> ChainResult<u64>;
}

/// A buy or sell call against the market contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeCall {
    pub market: Address,
    pub from: Address,
    pub direction: TradeDirection,
    pub token_amount: U256,
    /// Native value attached to the call (buys only).
    pub value: U256,
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptStatus {
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Signing / broadcasting capability of the connected wallet.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Dry-run the call against the latest state.
    async fn simulate(&self, call: &TradeCall) -> ChainResult<()>;

    async fn estimate_gas(&self, call: &TradeCall) -> ChainResult<u64>;

    async fn submit(&self, call: &TradeCall) -> ChainResult<TxHash>;

    async fn wait_for_receipt(&self, tx_hash: TxHash, timeout: Duration) -> ChainResult<ReceiptStatus>;
}
