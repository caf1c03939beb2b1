use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, TxHash, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;

use curvebot::chain::{ChainContext, ChainReader, ChainResult, ChainWriter, ReceiptStatus, TradeCall};
use curvebot::errors::ChainError;
use curvebot::models::{SupplyInfo, TradeLog, TradeLogKind};
use curvebot::units;

#[allow(dead_code)]
pub const MARKET: Address = address!("00000000000000000000000000000000000000aa");
#[allow(dead_code)]
pub const USER: Address = address!("00000000000000000000000000000000000000bb");

/// Context for the mock market with the mock user connected.
#[allow(dead_code)]
pub fn ctx() -> ChainContext {
    ChainContext::new(1, MARKET).with_account(USER)
}

/// Native / token units to 18-decimal fixed point.
#[allow(dead_code)]
pub fn wei(value: &str) -> U256 {
    let amount: Decimal = value.parse().expect("valid decimal");
    units::to_wei(amount).expect("in range")
}

#[derive(Debug, Clone)]
pub struct MockState {
    pub price: U256,
    pub price_error: Option<ChainError>,
    pub buy_cost: ChainResult<U256>,
    pub sell_proceeds: ChainResult<U256>,
    pub native_balances: HashMap<Address, U256>,
    pub token_balance: U256,
    pub supply: SupplyInfo,
    pub purchases: Vec<TradeLog>,
    pub sales: Vec<TradeLog>,
    pub logs_error: Option<ChainError>,
    pub block_number: u64,
    /// Seconds per block, counted from timestamp 1_700_000_000 at block 0.
    pub block_time: u64,
    pub timestamp_error: Option<ChainError>,
    pub quote_delays: HashMap<U256, Duration>,

    pub simulate_result: ChainResult<()>,
    pub gas_estimate: u64,
    pub submit_result: ChainResult<TxHash>,
    pub receipt_result: ChainResult<ReceiptStatus>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            price: wei("0.001"),
            price_error: None,
            buy_cost: Ok(wei("0.0105")),
            sell_proceeds: Ok(wei("0.0095")),
            native_balances: HashMap::new(),
            token_balance: U256::ZERO,
            supply: SupplyInfo {
                total_supply: wei("1000000"),
                total_sold: wei("2500"),
            },
            purchases: Vec::new(),
            sales: Vec::new(),
            logs_error: None,
            block_number: 100_000,
            block_time: 2,
            timestamp_error: None,
            quote_delays: HashMap::new(),
            simulate_result: Ok(()),
            gas_estimate: 90_000,
            submit_result: Ok(TxHash::repeat_byte(0x11)),
            receipt_result: Ok(ReceiptStatus {
                success: true,
                block_number: Some(100_001),
            }),
        }
    }
}

/// In-memory market implementing both chain traits. Every call is recorded by
/// name so tests can assert on what was (or was not) reached.
#[derive(Debug, Default)]
pub struct MockChain {
    pub state: Mutex<MockState>,
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Vec<TradeCall>>,
}

#[allow(dead_code)]
impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state(state: MockState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn submitted(&self) -> Vec<TradeCall> {
        self.submitted.lock().unwrap().clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn snapshot(&self) -> MockState {
        self.state.lock().unwrap().clone()
    }

    async fn quote_delay(&self, amount: U256) {
        let delay = self.state.lock().unwrap().quote_delays.get(&amount).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn current_price(&self, _market: Address) -> ChainResult<U256> {
        self.record("current_price");
        let state = self.snapshot();
        match state.price_error {
            Some(e) => Err(e),
            None => Ok(state.price),
        }
    }

    async fn buy_cost(&self, _market: Address, amount: U256) -> ChainResult<U256> {
        self.record("buy_cost");
        self.quote_delay(amount).await;
        self.snapshot().buy_cost
    }

    async fn sell_proceeds(&self, _market: Address, amount: U256) -> ChainResult<U256> {
        self.record("sell_proceeds");
        self.quote_delay(amount).await;
        self.snapshot().sell_proceeds
    }

    async fn native_balance(&self, address: Address) -> ChainResult<U256> {
        self.record("native_balance");
        Ok(self
            .snapshot()
            .native_balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn token_balance(&self, _market: Address, _account: Address) -> ChainResult<U256> {
        self.record("token_balance");
        Ok(self.snapshot().token_balance)
    }

    async fn supply(&self, _market: Address) -> ChainResult<SupplyInfo> {
        self.record("supply");
        Ok(self.snapshot().supply)
    }

    async fn trade_logs(
        &self,
        _market: Address,
        kind: TradeLogKind,
        from_block: u64,
        to_block: u64,
    ) -> ChainResult<Vec<TradeLog>> {
        self.record("trade_logs");
        let state = self.snapshot();
        if let Some(e) = state.logs_error {
            return Err(e);
        }
        let logs = match kind {
            TradeLogKind::Purchase => state.purchases,
            TradeLogKind::Sale => state.sales,
        };
        Ok(logs
            .into_iter()
            .filter(|l| l.block_number >= from_block && l.block_number <= to_block)
            .collect())
    }

    async fn block_timestamp(&self, block_number: u64) -> ChainResult<u64> {
        self.record("block_timestamp");
        let state = self.snapshot();
        match state.timestamp_error {
            Some(e) => Err(e),
            None => Ok(1_700_000_000 + block_number * state.block_time),
        }
    }

    async fn current_block_number(&self) -> ChainResult<u64> {
        self.record("current_block_number");
        Ok(self.snapshot().block_number)
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    async fn simulate(&self, _call: &TradeCall) -> ChainResult<()> {
        self.record("simulate");
        self.snapshot().simulate_result
    }

    async fn estimate_gas(&self, _call: &TradeCall) -> ChainResult<u64> {
        self.record("estimate_gas");
        Ok(self.snapshot().gas_estimate)
    }

    async fn submit(&self, call: &TradeCall) -> ChainResult<TxHash> {
        self.record("submit");
        self.submitted.lock().unwrap().push(call.clone());
        self.snapshot().submit_result
    }

    async fn wait_for_receipt(&self, _tx_hash: TxHash, _timeout: Duration) -> ChainResult<ReceiptStatus> {
        self.record("wait_for_receipt");
        self.snapshot().receipt_result
    }
}

/// Trade log helper.
#[allow(dead_code)]
pub fn trade_log(kind: TradeLogKind, block_number: u64, price: &str) -> TradeLog {
    TradeLog {
        kind,
        block_number,
        price: wei(price),
    }
}
