use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::Instrument;
use uuid::Uuid;

use crate::chain::{ChainContext, ChainReader, ChainWriter, TradeCall};
use crate::errors::ChainError;
use crate::models::{Balances, Confirmation, TradeDirection, TradeQuote, TradeReceipt, TradeRequest, TradeStage};
use crate::scheduler::RefreshTrigger;
use crate::units;

use super::validation::{self, AccountSnapshot, TradeLimits};

/// Why a trade did not reach the chain, or did and failed. Raw chain errors
/// are logged, never carried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TradeError {
    #[error("no account connected")]
    NotConnected,

    #[error("token amount must be positive")]
    InvalidAmount,

    #[error("no quote available for this trade")]
    QuoteMissing,

    #[error("quote does not match the requested trade")]
    QuoteMismatch,

    #[error("quote expired, refresh and try again")]
    QuoteExpired,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("market cannot cover proceeds: need {needed}, market holds {available}")]
    InsufficientLiquidity { needed: Decimal, available: Decimal },

    #[error("insufficient funds for amount plus network fee")]
    InsufficientFunds,

    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    #[error("transaction rejected in wallet")]
    UserRejected,

    #[error("timed out waiting for confirmation")]
    Timeout,

    #[error("transaction reverted on chain")]
    Reverted,

    #[error("trade failed while {stage}")]
    Failed { stage: TradeStage },
}

impl TradeError {
    fn from_chain(error: &ChainError, stage: TradeStage) -> Self {
        match error {
            ChainError::UserRejected => TradeError::UserRejected,
            ChainError::InsufficientFunds(_) => TradeError::InsufficientFunds,
            ChainError::Timeout(_) => TradeError::Timeout,
            ChainError::Reverted(message) if stage == TradeStage::Simulating => {
                TradeError::SimulationFailed(revert_reason(message))
            }
            ChainError::Reverted(_) => TradeError::Reverted,
            _ if stage == TradeStage::Simulating => {
                TradeError::SimulationFailed("simulation unavailable".into())
            }
            _ => TradeError::Failed { stage },
        }
    }
}

/// Short revert reason out of a node error message.
fn revert_reason(message: &str) -> String {
    let lower = message.to_lowercase();
    match lower.find("reverted:") {
        Some(idx) => message[idx + "reverted:".len()..].trim().to_string(),
        None => "execution reverted".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub limits: TradeLimits,
    /// Gas added on top of the sell estimate (default 50,000).
    pub gas_buffer: u64,
    /// Pause between simulation and submission (default 500ms).
    pub post_simulation_delay: Duration,
    /// How long to wait for a receipt (default 120s).
    pub receipt_timeout: Duration,
    /// Wait before re-reading balances when the receipt is unretrievable (default 5s).
    pub receipt_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            limits: TradeLimits::default(),
            gas_buffer: 50_000,
            post_simulation_delay: Duration::from_millis(500),
            receipt_timeout: Duration::from_secs(120),
            receipt_grace: Duration::from_secs(5),
        }
    }
}

/// Runs a quoted trade through validation, simulation, submission and
/// confirmation. The current stage is observable via [`TradeExecutor::subscribe`].
pub struct TradeExecutor {
    reader: Arc<dyn ChainReader>,
    writer: Arc<dyn ChainWriter>,
    config: ExecutorConfig,
    stage_tx: watch::Sender<TradeStage>,
    refresh: Option<RefreshTrigger>,
}

impl TradeExecutor {
    pub fn new(reader: Arc<dyn ChainReader>, writer: Arc<dyn ChainWriter>, config: ExecutorConfig) -> Self {
        let (stage_tx, _) = watch::channel(TradeStage::Idle);
        Self {
            reader,
            writer,
            config,
            stage_tx,
            refresh: None,
        }
    }

    /// Fire `trigger` after every successful trade.
    pub fn with_refresh(mut self, trigger: RefreshTrigger) -> Self {
        self.refresh = Some(trigger);
        self
    }

    pub fn stage(&self) -> TradeStage {
        *self.stage_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TradeStage> {
        self.stage_tx.subscribe()
    }

    /// Execute `request` at `quote`.
    pub async fn execute(
        &self,
        ctx: &ChainContext,
        request: &TradeRequest,
        quote: Option<&TradeQuote>,
    ) -> Result<TradeReceipt, TradeError> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!(
            "trade",
            %id,
            direction = %request.direction,
            amount = %request.token_amount,
        );

        async {
            let result = self.run(id, ctx, request, quote).await;

            match &result {
                Ok(receipt) => {
                    self.set_stage(TradeStage::Succeeded);
                    if receipt.is_verified() {
                        counter!("trades_confirmed_total").increment(1);
                    } else {
                        counter!("trades_unverified_total").increment(1);
                    }
                    if let Some(trigger) = &self.refresh {
                        trigger.fire();
                    }
                }
                Err(e) => {
                    counter!("trades_failed_total").increment(1);
                    tracing::error!(error = %e, stage = %self.stage(), "Trade failed");
                    self.set_stage(TradeStage::Failed);
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        id: Uuid,
        ctx: &ChainContext,
        request: &TradeRequest,
        quote: Option<&TradeQuote>,
    ) -> Result<TradeReceipt, TradeError> {
        // 1. Validating
        self.set_stage(TradeStage::Validating);
        let (account, quote) =
            validation::check_request(ctx, request, quote, &self.config.limits, Utc::now())?;
        let amount_wei = units::to_wei(request.token_amount).map_err(|_| TradeError::InvalidAmount)?;

        let balances = self
            .read_balances(ctx.market, account)
            .await
            .map_err(|e| self.chain_failure(&e, TradeStage::Validating))?;
        validation::check_balances(request, quote, &to_snapshot(&balances), &self.config.limits)?;

        let mut call = TradeCall {
            market: ctx.market,
            from: account,
            direction: request.direction,
            token_amount: amount_wei,
            value: match request.direction {
                TradeDirection::Buy => quote.cost_or_proceeds,
                TradeDirection::Sell => U256::ZERO,
            },
            gas_limit: None,
        };

        // 2. Simulating (sells only)
        if request.direction == TradeDirection::Sell {
            self.set_stage(TradeStage::Simulating);
            let gas = self.simulate_sell(ctx.market, account, &call, quote).await?;
            call.gas_limit = Some(gas.saturating_add(self.config.gas_buffer));
        }

        // 3. Submitting
        self.set_stage(TradeStage::Submitting);
        let tx_hash = self
            .writer
            .submit(&call)
            .await
            .map_err(|e| self.chain_failure(&e, TradeStage::Submitting))?;
        counter!("trades_submitted_total").increment(1);
        tracing::info!(tx_hash = %tx_hash, value = %call.value, gas_limit = ?call.gas_limit, "Trade submitted");

        // 4. Confirming
        self.set_stage(TradeStage::Confirming);
        let confirmation = match self
            .writer
            .wait_for_receipt(tx_hash, self.config.receipt_timeout)
            .await
        {
            Ok(status) if status.success => Confirmation::Receipt {
                block_number: status.block_number,
            },
            Ok(status) => {
                tracing::warn!(tx_hash = %tx_hash, block = ?status.block_number, "Trade reverted");
                return Err(TradeError::Reverted);
            }
            Err(e) if e.is_receipt_unavailable() => {
                tracing::warn!(
                    tx_hash = %tx_hash,
                    error = %e,
                    grace_ms = self.config.receipt_grace.as_millis() as u64,
                    "Receipt unavailable, treating submission as likely successful"
                );
                sleep(self.config.receipt_grace).await;
                Confirmation::Unverified
            }
            Err(e) => return Err(self.chain_failure(&e, TradeStage::Confirming)),
        };

        let balances_after = match self.read_balances(ctx.market, account).await {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh balances after trade");
                None
            }
        };

        tracing::info!(tx_hash = %tx_hash, confirmation = ?confirmation, "Trade settled");

        Ok(TradeReceipt {
            id,
            tx_hash,
            direction: request.direction,
            token_amount: request.token_amount,
            confirmation,
            balances_after,
        })
    }

    /// Re-check balances on both sides, dry-run the call and estimate gas.
    async fn simulate_sell(
        &self,
        market: Address,
        account: Address,
        call: &TradeCall,
        quote: &TradeQuote,
    ) -> Result<u64, TradeError> {
        let (token_balance, market_balance) = tokio::try_join!(
            self.reader.token_balance(market, account),
            self.reader.native_balance(market),
        )
        .map_err(|e| self.chain_failure(&e, TradeStage::Simulating))?;

        if token_balance < call.token_amount {
            return Err(TradeError::InsufficientBalance {
                needed: units::from_wei(call.token_amount).unwrap_or_default(),
                available: units::from_wei(token_balance).unwrap_or_default(),
            });
        }
        if market_balance < quote.cost_or_proceeds {
            return Err(TradeError::InsufficientLiquidity {
                needed: quote.native_value(),
                available: units::from_wei(market_balance).unwrap_or_default(),
            });
        }

        self.writer
            .simulate(call)
            .await
            .map_err(|e| self.chain_failure(&e, TradeStage::Simulating))?;
        let gas = self
            .writer
            .estimate_gas(call)
            .await
            .map_err(|e| self.chain_failure(&e, TradeStage::Simulating))?;

        tracing::debug!(gas, "Sell simulation passed");
        sleep(self.config.post_simulation_delay).await;
        Ok(gas)
    }

    async fn read_balances(&self, market: Address, account: Address) -> Result<Balances, ChainError> {
        let (native, token) = tokio::try_join!(
            self.reader.native_balance(account),
            self.reader.token_balance(market, account),
        )?;
        Ok(Balances { native, token })
    }

    fn chain_failure(&self, error: &ChainError, stage: TradeStage) -> TradeError {
        tracing::warn!(error = %error, %stage, "Chain call failed during trade");
        TradeError::from_chain(error, stage)
    }

    fn set_stage(&self, stage: TradeStage) {
        tracing::debug!(%stage, "Trade stage");
        self.stage_tx.send_replace(stage);
    }
}

fn to_snapshot(balances: &Balances) -> AccountSnapshot {
    AccountSnapshot {
        native_balance: units::from_wei(balances.native).unwrap_or(Decimal::MAX),
        token_balance: units::from_wei(balances.token).unwrap_or(Decimal::MAX),
    }
}
