mod common;

use rust_decimal::Decimal;

use curvebot::errors::ChainError;
use curvebot::models::{QuoteSource, TradeDirection};
use curvebot::quote::{QuoteEngine, QuoteError, QuotePolicy};

use common::{ctx, wei, MockChain, MockState};

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn engine(chain: &std::sync::Arc<MockChain>) -> QuoteEngine {
    QuoteEngine::new(chain.clone(), QuotePolicy::default())
}

#[tokio::test]
async fn test_contract_quote_is_preferred() {
    let chain = MockChain::new();
    let quote = engine(&chain)
        .quote(&ctx(), TradeDirection::Buy, d("10"))
        .await
        .unwrap();

    assert_eq!(quote.source, QuoteSource::Contract);
    assert_eq!(quote.amount_in, d("10"));
    assert_eq!(quote.cost_or_proceeds, wei("0.0105"));
    // avg 0.00105 vs spot 0.001
    assert!((quote.price_impact_percent - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_sell_quote_uses_sale_return() {
    let chain = MockChain::new();
    let quote = engine(&chain)
        .quote(&ctx(), TradeDirection::Sell, d("10"))
        .await
        .unwrap();

    assert_eq!(quote.source, QuoteSource::Contract);
    assert_eq!(quote.cost_or_proceeds, wei("0.0095"));
    assert!((quote.price_impact_percent - 5.0).abs() < 1e-9);
    assert_eq!(chain.call_count("sell_proceeds"), 1);
    assert_eq!(chain.call_count("buy_cost"), 0);
}

#[tokio::test]
async fn test_micro_price_fallback_when_contract_throws() {
    let chain = MockChain::with_state(MockState {
        price: wei("0.00001"),
        buy_cost: Err(ChainError::Reverted("arithmetic underflow".into())),
        ..MockState::default()
    });

    let quote = engine(&chain)
        .quote(&ctx(), TradeDirection::Buy, d("1"))
        .await
        .unwrap();

    assert_eq!(quote.source, QuoteSource::Fallback);
    assert_eq!(quote.cost_or_proceeds, wei("0.00001"));
    assert_eq!(quote.price_impact_percent, 10.0);
}

#[tokio::test]
async fn test_result_above_ceiling_falls_back() {
    let chain = MockChain::with_state(MockState {
        buy_cost: Ok(wei("5000000")),
        ..MockState::default()
    });

    let quote = engine(&chain)
        .quote(&ctx(), TradeDirection::Buy, d("10"))
        .await
        .unwrap();

    assert_eq!(quote.source, QuoteSource::Fallback);
    // linear: avg = 0.001 * (1 + 10 * 0.01 / 2) = 0.00105
    assert_eq!(quote.cost_or_proceeds, wei("0.0105"));
}

#[tokio::test]
async fn test_unseeded_curve_quotes_fixed_buy_cost() {
    let chain = MockChain::with_state(MockState {
        price: alloy::primitives::U256::ZERO,
        ..MockState::default()
    });

    let quote = engine(&chain)
        .quote(&ctx(), TradeDirection::Buy, d("42"))
        .await
        .unwrap();

    // zero spot makes the contract result unusable for impact
    assert_eq!(quote.source, QuoteSource::Fallback);
    assert_eq!(quote.cost_or_proceeds, wei("0.0001"));
    assert_eq!(quote.price_impact_percent, 0.0);
}

#[tokio::test]
async fn test_fallback_sell_respects_floor() {
    let chain = MockChain::with_state(MockState {
        price: wei("1"),
        sell_proceeds: Err(ChainError::Unavailable("node down".into())),
        ..MockState::default()
    });

    let quote = engine(&chain)
        .quote(&ctx(), TradeDirection::Sell, d("1000"))
        .await
        .unwrap();

    assert_eq!(quote.source, QuoteSource::Fallback);
    // floor at 0.7 of spot
    assert_eq!(quote.cost_or_proceeds, wei("700"));
    assert!((quote.price_impact_percent - 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_rejects_non_positive_amount() {
    let chain = MockChain::new();
    let result = engine(&chain).quote(&ctx(), TradeDirection::Buy, Decimal::ZERO).await;
    assert!(matches!(result, Err(QuoteError::InvalidAmount(_))));
    assert!(chain.calls().is_empty());
}

#[tokio::test]
async fn test_both_paths_failing_is_an_error() {
    let chain = MockChain::with_state(MockState {
        buy_cost: Ok(wei("5000000")),
        ..MockState::default()
    });
    let policy = QuotePolicy {
        sanity_ceiling: d("0.000001"),
        ..QuotePolicy::default()
    };

    let result = QuoteEngine::new(chain.clone(), policy)
        .quote(&ctx(), TradeDirection::Buy, d("10"))
        .await;
    assert!(matches!(result, Err(QuoteError::ImplausibleResult(_))));
}

#[tokio::test]
async fn test_unreadable_price_is_chain_unavailable() {
    let chain = MockChain::with_state(MockState {
        price_error: Some(ChainError::Unavailable("connection refused".into())),
        buy_cost: Err(ChainError::Reverted("execution reverted".into())),
        ..MockState::default()
    });

    let result = engine(&chain).quote(&ctx(), TradeDirection::Buy, d("10")).await;

    assert!(matches!(result, Err(QuoteError::ChainUnavailable(_))));
    assert_eq!(chain.call_count("buy_cost"), 1);
}

#[tokio::test]
async fn test_buy_impact_stays_in_bounds() {
    for (amount, cost) in [("0.001", "0.000001"), ("1", "0.5"), ("10", "900"), ("500", "0.9")] {
        let chain = MockChain::with_state(MockState {
            buy_cost: Ok(wei(cost)),
            ..MockState::default()
        });
        let quote = engine(&chain)
            .quote(&ctx(), TradeDirection::Buy, d(amount))
            .await
            .unwrap();
        assert!(
            (0.0..=100.0).contains(&quote.price_impact_percent),
            "amount {amount}: impact {}",
            quote.price_impact_percent
        );
    }
}
