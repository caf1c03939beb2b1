use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use alloy::primitives::Address;
use rust_decimal::Decimal;

use crate::execution::{ExecutorConfig, TradeLimits};
use crate::history::HistoryConfig;
use crate::models::{ChartMode, Timeframe, TradeDirection};
use crate::quote::QuotePolicy;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub market_address: Address,

    // Signer (optional, without it the client is read-only)
    pub private_key: Option<String>,

    // Initial selections
    pub quote_direction: TradeDirection,
    pub quote_amount: Option<String>,
    pub timeframe: Timeframe,
    pub chart_mode: ChartMode,

    // Execution
    pub execute_trade: bool,

    pub metrics_addr: Option<SocketAddr>,

    pub quote_policy: QuotePolicy,
    pub history: HistoryConfig,
    pub scheduler: SchedulerConfig,
    pub executor: ExecutorConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let market_address: Address = env::var("MARKET_ADDRESS")
            .map_err(|_| anyhow::anyhow!("MARKET_ADDRESS must be set"))?
            .parse()
            .map_err(|e| anyhow::anyhow!("MARKET_ADDRESS is not a valid address: {e}"))?;

        let quote_policy = QuotePolicy {
            sanity_ceiling: env::var("SANITY_CEILING")
                .unwrap_or_else(|_| "1000000".into())
                .parse()
                .unwrap_or(Decimal::from(1_000_000)),
            ..QuotePolicy::default()
        };

        let history = HistoryConfig {
            max_log_range: env_u64("MAX_LOG_RANGE", 10_000).max(1),
            ..HistoryConfig::default()
        };

        let scheduler = SchedulerConfig {
            history_interval: Duration::from_secs(env_u64("HISTORY_REFRESH_SECS", 30).max(1)),
            stats_interval: Duration::from_secs(env_u64("STATS_REFRESH_SECS", 30).max(1)),
            balance_interval: Duration::from_secs(env_u64("BALANCE_REFRESH_SECS", 15).max(1)),
        };

        let executor = ExecutorConfig {
            limits: TradeLimits {
                quote_ttl: chrono::Duration::seconds(env_u64("QUOTE_TTL_SECS", 30) as i64),
                ..TradeLimits::default()
            },
            receipt_timeout: Duration::from_secs(env_u64("RECEIPT_TIMEOUT_SECS", 120)),
            receipt_grace: Duration::from_secs(env_u64("RECEIPT_GRACE_SECS", 5)),
            ..ExecutorConfig::default()
        };

        Ok(Self {
            rpc_url: env::var("RPC_URL").map_err(|_| anyhow::anyhow!("RPC_URL must be set"))?,
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| "1".into())
                .parse()?,
            market_address,

            private_key: env::var("PRIVATE_KEY").ok().filter(|k| !k.trim().is_empty()),

            quote_direction: env::var("QUOTE_DIRECTION")
                .ok()
                .and_then(|s| TradeDirection::from_input(&s))
                .unwrap_or(TradeDirection::Buy),
            quote_amount: env::var("QUOTE_AMOUNT").ok().filter(|s| !s.trim().is_empty()),
            timeframe: env::var("TIMEFRAME")
                .unwrap_or_else(|_| "24h".into())
                .parse()
                .unwrap_or(Timeframe::OneDay),
            chart_mode: env::var("CHART_MODE")
                .unwrap_or_else(|_| "line".into())
                .parse()
                .unwrap_or_default(),

            execute_trade: env::var("EXECUTE_TRADE")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),

            metrics_addr: match env::var("METRICS_ADDR") {
                Ok(addr) if !addr.trim().is_empty() => Some(addr.trim().parse()?),
                _ => None,
            },

            quote_policy,
            history,
            scheduler,
            executor,
        })
    }

    /// Returns true if a signing key is configured.
    pub fn has_signer(&self) -> bool {
        self.private_key.is_some()
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
