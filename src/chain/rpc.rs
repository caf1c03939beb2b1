use std::str::FromStr;
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tokio::time::sleep;

use crate::errors::ChainError;
use crate::models::{SupplyInfo, TradeDirection, TradeLog, TradeLogKind};

use super::{ChainReader, ChainResult, ChainWriter, ReceiptStatus, TradeCall};

sol! {
    #[sol(rpc)]
    contract BondingCurveMarket {
        event TokensPurchased(address indexed buyer, uint256 amount, uint256 cost, uint256 price);
        event TokensSold(address indexed seller, uint256 amount, uint256 proceeds, uint256 price);

        function getCurrentPrice() external view returns (uint256);
        function calculatePurchaseCost(uint256 amount) external view returns (uint256);
        function calculateSaleReturn(uint256 amount) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function tokensSold() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);

        function buy(uint256 amount) external payable;
        function sell(uint256 amount) external;
    }
}

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// JSON-RPC implementation of the chain traits over an alloy provider.
///
/// With a private key the provider carries a local wallet and can sign. Without
/// one the client is read-only and `submit` fails with `Unavailable`.
#[derive(Clone)]
pub struct RpcChain {
    provider: DynProvider,
    account: Option<Address>,
}

impl RpcChain {
    /// Build a provider for `rpc_url`, optionally signing with `private_key`
    /// (hex, with or without `0x`).
    pub fn connect(rpc_url: &str, private_key: Option<&str>) -> anyhow::Result<Self> {
        let url: Url = rpc_url.parse()?;

        let (provider, account) = match private_key {
            Some(key) => {
                let signer = PrivateKeySigner::from_str(key)?;
                let account = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(url)
                    .erased();
                (provider, Some(account))
            }
            None => (ProviderBuilder::new().connect_http(url).erased(), None),
        };

        Ok(Self { provider, account })
    }

    /// Address of the local signer, if one is configured.
    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub async fn chain_id(&self) -> ChainResult<u64> {
        self.provider.get_chain_id().await.map_err(rpc_err)
    }

    fn market(&self, market: Address) -> BondingCurveMarket::BondingCurveMarketInstance<DynProvider> {
        BondingCurveMarket::new(market, self.provider.clone())
    }

    fn build_tx(&self, call: &TradeCall) -> TransactionRequest {
        let input = match call.direction {
            TradeDirection::Buy => BondingCurveMarket::buyCall {
                amount: call.token_amount,
            }
            .abi_encode(),
            TradeDirection::Sell => BondingCurveMarket::sellCall {
                amount: call.token_amount,
            }
            .abi_encode(),
        };

        let tx = TransactionRequest::default()
            .with_from(call.from)
            .with_to(call.market)
            .with_input(input)
            .with_value(call.value);

        match call.gas_limit {
            Some(gas) => tx.with_gas_limit(gas),
            None => tx,
        }
    }
}

fn rpc_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::classify(e.to_string())
}

/// Decode raw logs of one event type, skipping any that fail to decode or
/// are still pending (no block number).
fn decode_trade_logs<E: SolEvent>(
    logs: &[Log],
    kind: TradeLogKind,
    price_of: fn(&E) -> U256,
) -> Vec<TradeLog> {
    logs.iter()
        .filter_map(|log| {
            let block_number = log.block_number?;
            match log.log_decode::<E>() {
                Ok(decoded) => Some(TradeLog {
                    kind,
                    block_number,
                    price: price_of(&decoded.inner.data),
                }),
                Err(e) => {
                    tracing::debug!(error = %e, %kind, block_number, "Skipping undecodable trade log");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl ChainReader for RpcChain {
    async fn current_price(&self, market: Address) -> ChainResult<U256> {
        self.market(market).getCurrentPrice().call().await.map_err(rpc_err)
    }

    async fn buy_cost(&self, market: Address, amount: U256) -> ChainResult<U256> {
        self.market(market)
            .calculatePurchaseCost(amount)
            .call()
            .await
            .map_err(rpc_err)
    }

    async fn sell_proceeds(&self, market: Address, amount: U256) -> ChainResult<U256> {
        self.market(market)
            .calculateSaleReturn(amount)
            .call()
            .await
            .map_err(rpc_err)
    }

    async fn native_balance(&self, address: Address) -> ChainResult<U256> {
        self.provider.get_balance(address).await.map_err(rpc_err)
    }

    async fn token_balance(&self, market: Address, account: Address) -> ChainResult<U256> {
        self.market(market).balanceOf(account).call().await.map_err(rpc_err)
    }

    async fn supply(&self, market: Address) -> ChainResult<SupplyInfo> {
        let contract = self.market(market);
        let total_supply = contract.totalSupply();
        let total_sold = contract.tokensSold();
        let (total_supply, total_sold) =
            tokio::try_join!(total_supply.call(), total_sold.call()).map_err(rpc_err)?;
        Ok(SupplyInfo {
            total_supply,
            total_sold,
        })
    }

    async fn trade_logs(
        &self,
        market: Address,
        kind: TradeLogKind,
        from_block: u64,
        to_block: u64,
    ) -> ChainResult<Vec<TradeLog>> {
        let signature = match kind {
            TradeLogKind::Purchase => BondingCurveMarket::TokensPurchased::SIGNATURE_HASH,
            TradeLogKind::Sale => BondingCurveMarket::TokensSold::SIGNATURE_HASH,
        };
        let filter = Filter::new()
            .address(market)
            .event_signature(signature)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await.map_err(rpc_err)?;

        let decoded = match kind {
            TradeLogKind::Purchase => decode_trade_logs::<BondingCurveMarket::TokensPurchased>(
                &logs,
                kind,
                |e| e.price,
            ),
            TradeLogKind::Sale => {
                decode_trade_logs::<BondingCurveMarket::TokensSold>(&logs, kind, |e| e.price)
            }
        };
        Ok(decoded)
    }

    async fn block_timestamp(&self, block_number: u64) -> ChainResult<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await
            .map_err(rpc_err)?
            .ok_or_else(|| ChainError::Unavailable(format!("block {block_number} not found")))?;
        Ok(block.header.timestamp)
    }

    async fn current_block_number(&self) -> ChainResult<u64> {
        self.provider.get_block_number().await.map_err(rpc_err)
    }
}

#[async_trait]
impl ChainWriter for RpcChain {
    async fn simulate(&self, call: &TradeCall) -> ChainResult<()> {
        self.provider
            .call(self.build_tx(call))
            .await
            .map_err(rpc_err)?;
        Ok(())
    }

    async fn estimate_gas(&self, call: &TradeCall) -> ChainResult<u64> {
        self.provider
            .estimate_gas(self.build_tx(call))
            .await
            .map_err(rpc_err)
    }

    async fn submit(&self, call: &TradeCall) -> ChainResult<TxHash> {
        if self.account.is_none() {
            return Err(ChainError::Unavailable("no signer configured".into()));
        }
        let pending = self
            .provider
            .send_transaction(self.build_tx(call))
            .await
            .map_err(rpc_err)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash, timeout: Duration) -> ChainResult<ReceiptStatus> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => {
                        return Ok(ReceiptStatus {
                            success: receipt.status(),
                            block_number: receipt.block_number,
                        });
                    }
                    Ok(None) => sleep(RECEIPT_POLL_INTERVAL).await,
                    Err(e) => return Err(rpc_err(e)),
                }
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ChainError::Timeout(format!("no receipt for {tx_hash} after {}s", timeout.as_secs())))?
    }
}
