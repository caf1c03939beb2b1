use std::sync::Arc;
use std::time::Duration;

use curvebot::chain::{ChainContext, ChainReader, ChainWriter, RpcChain};
use curvebot::config::AppConfig;
use curvebot::execution::TradeExecutor;
use curvebot::history::HistoryAggregator;
use curvebot::models::{PriceSeries, TradeRequest};
use curvebot::quote::QuoteEngine;
use curvebot::scheduler::RefreshScheduler;
use curvebot::units;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    curvebot::metrics::init_metrics(config.metrics_addr)?;

    // --- Chain connection ---
    let chain = Arc::new(RpcChain::connect(&config.rpc_url, config.private_key.as_deref())?);
    let node_chain_id = chain.chain_id().await?;
    if node_chain_id != config.chain_id {
        tracing::warn!(
            expected = config.chain_id,
            actual = node_chain_id,
            "Node reports a different chain id than configured"
        );
    }

    let mut ctx = ChainContext::new(node_chain_id, config.market_address);
    match chain.account() {
        Some(account) => {
            ctx = ctx.with_account(account);
            tracing::info!(%account, "Signer loaded");
        }
        None => tracing::warn!("No PRIVATE_KEY, running read-only"),
    }
    tracing::info!(%ctx, "Connected");

    let reader: Arc<dyn ChainReader> = chain.clone();
    let writer: Arc<dyn ChainWriter> = chain.clone();

    // --- Engines + scheduler ---
    let quotes = Arc::new(QuoteEngine::new(reader.clone(), config.quote_policy.clone()));
    let history = Arc::new(HistoryAggregator::new(reader.clone(), config.history.clone()));
    let scheduler = RefreshScheduler::new(quotes, history, reader.clone(), config.scheduler.clone());

    spawn_state_loggers(&scheduler);

    scheduler.set_timeframe(config.timeframe);
    scheduler.set_chart_mode(config.chart_mode);
    scheduler.start(ctx);
    if let Some(amount) = &config.quote_amount {
        scheduler.set_quote_input(config.quote_direction, amount);
    }

    // --- Optional one-shot trade ---
    if config.execute_trade && !config.has_signer() {
        tracing::warn!("EXECUTE_TRADE set without PRIVATE_KEY, skipping trade");
    } else if config.execute_trade {
        let executor = TradeExecutor::new(reader.clone(), writer, config.executor.clone())
            .with_refresh(scheduler.trigger());
        run_configured_trade(&config, &ctx, &scheduler, &executor).await;
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    scheduler.shutdown();

    Ok(())
}

/// Wait for the first quote of the configured input, then execute it.
async fn run_configured_trade(
    config: &AppConfig,
    ctx: &ChainContext,
    scheduler: &RefreshScheduler,
    executor: &TradeExecutor,
) {
    let Some(amount) = config
        .quote_amount
        .as_deref()
        .and_then(|a| units::parse_token_amount(a).ok())
    else {
        tracing::warn!("EXECUTE_TRADE set but QUOTE_AMOUNT is missing or invalid");
        return;
    };

    let mut quote_rx = scheduler.subscribe_quote();
    let quote = match tokio::time::timeout(Duration::from_secs(30), quote_rx.wait_for(|q| q.is_some())).await {
        Ok(Ok(q)) => q.clone(),
        _ => None,
    };

    let request = TradeRequest {
        direction: config.quote_direction,
        token_amount: amount,
    };
    match executor.execute(ctx, &request, quote.as_ref()).await {
        Ok(receipt) => tracing::info!(
            tx_hash = %receipt.tx_hash,
            verified = receipt.is_verified(),
            "Trade completed"
        ),
        Err(e) => tracing::error!(error = %e, "Trade not completed"),
    }
}

fn spawn_state_loggers(scheduler: &RefreshScheduler) {
    let mut quote_rx = scheduler.subscribe_quote();
    tokio::spawn(async move {
        while quote_rx.changed().await.is_ok() {
            if let Some(quote) = quote_rx.borrow_and_update().as_ref() {
                tracing::info!("{quote}");
            }
        }
    });

    let mut series_rx = scheduler.subscribe_series();
    tokio::spawn(async move {
        while series_rx.changed().await.is_ok() {
            if let Some(series) = series_rx.borrow_and_update().as_ref() {
                let kind = match series {
                    PriceSeries::Line(_) => "line",
                    PriceSeries::Candles(_) => "candles",
                };
                tracing::info!(
                    kind,
                    points = series.len(),
                    last_price = ?series.last_price(),
                    "Price history updated"
                );
            }
        }
    });

    let mut stats_rx = scheduler.subscribe_stats();
    tokio::spawn(async move {
        while stats_rx.changed().await.is_ok() {
            if let Some(stats) = stats_rx.borrow_and_update().as_ref() {
                tracing::info!(
                    price = %stats.current_price,
                    total_supply = %stats.total_supply,
                    total_sold = %stats.total_sold,
                    market_cap = %stats.market_cap(),
                    "Market stats updated"
                );
            }
        }
    });

    let mut balances_rx = scheduler.subscribe_balances();
    tokio::spawn(async move {
        while balances_rx.changed().await.is_ok() {
            if let Some(balances) = *balances_rx.borrow_and_update() {
                tracing::info!(
                    native = %units::from_wei(balances.native).unwrap_or_default(),
                    token = %units::from_wei(balances.token).unwrap_or_default(),
                    "Balances updated"
                );
            }
        }
    });
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
