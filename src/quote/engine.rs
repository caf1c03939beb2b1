use std::sync::Arc;

use alloy::primitives::U256;
use chrono::Utc;
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{ChainContext, ChainReader};
use crate::errors::ChainError;
use crate::models::{QuoteSource, TradeDirection, TradeQuote};
use crate::units;

use super::fallback::{self, FallbackPolicy};

/// Bounds every quote must satisfy, plus the fallback tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotePolicy {
    /// Largest plausible cost / proceeds in native units (default 1,000,000).
    pub sanity_ceiling: Decimal,
    pub fallback: FallbackPolicy,
}

impl Default for QuotePolicy {
    fn default() -> Self {
        Self {
            sanity_ceiling: Decimal::from(1_000_000),
            fallback: FallbackPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("token amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("chain unavailable: {0}")]
    ChainUnavailable(#[from] ChainError),

    #[error("implausible quote: {0}")]
    ImplausibleResult(String),
}

/// Prices candidate trades against a market.
///
/// The contract's own cost / proceeds function is authoritative. When it fails
/// or returns something outside the sanity bounds, a local linear approximation
/// is used instead.
pub struct QuoteEngine {
    reader: Arc<dyn ChainReader>,
    policy: QuotePolicy,
}

impl QuoteEngine {
    pub fn new(reader: Arc<dyn ChainReader>, policy: QuotePolicy) -> Self {
        Self { reader, policy }
    }

    /// Quote `token_amount` tokens in `direction`.
    pub async fn quote(
        &self,
        ctx: &ChainContext,
        direction: TradeDirection,
        token_amount: Decimal,
    ) -> Result<TradeQuote, QuoteError> {
        if token_amount <= Decimal::ZERO {
            return Err(QuoteError::InvalidAmount(token_amount));
        }
        let amount_wei =
            units::to_wei(token_amount).map_err(|e| QuoteError::ImplausibleResult(e.to_string()))?;
        if amount_wei.is_zero() {
            return Err(QuoteError::InvalidAmount(token_amount));
        }

        match self.contract_quote(ctx, direction, token_amount, amount_wei).await {
            Ok(quote) => {
                counter!("quotes_total", "source" => QuoteSource::Contract.as_str()).increment(1);
                return Ok(quote);
            }
            Err(e) => {
                tracing::warn!(
                    market = %ctx.market,
                    direction = %direction,
                    amount = %token_amount,
                    error = %e,
                    "Contract quote unusable, falling back to local approximation"
                );
            }
        }

        match self.fallback_quote(ctx, direction, token_amount).await {
            Ok(quote) => {
                counter!("quotes_total", "source" => QuoteSource::Fallback.as_str()).increment(1);
                Ok(quote)
            }
            Err(e) => {
                counter!("quote_failures_total").increment(1);
                tracing::error!(
                    market = %ctx.market,
                    direction = %direction,
                    amount = %token_amount,
                    error = %e,
                    "No quote available"
                );
                Err(e)
            }
        }
    }

    async fn contract_quote(
        &self,
        ctx: &ChainContext,
        direction: TradeDirection,
        amount: Decimal,
        amount_wei: U256,
    ) -> Result<TradeQuote, QuoteError> {
        let total = async {
            match direction {
                TradeDirection::Buy => self.reader.buy_cost(ctx.market, amount_wei).await,
                TradeDirection::Sell => self.reader.sell_proceeds(ctx.market, amount_wei).await,
            }
        };
        let (total_raw, price_raw) = tokio::try_join!(total, self.reader.current_price(ctx.market))?;

        let total = units::from_wei(total_raw)
            .map_err(|e| QuoteError::ImplausibleResult(e.to_string()))?;
        let current_price = units::from_wei(price_raw)
            .map_err(|e| QuoteError::ImplausibleResult(e.to_string()))?;

        self.check_ceiling(total)?;
        if current_price.is_zero() {
            return Err(QuoteError::ImplausibleResult("spot price is zero".into()));
        }

        let impact = average_price_impact(direction, total, amount, current_price).ok_or_else(|| {
            QuoteError::ImplausibleResult(format!("impact overflow: total {total}, spot {current_price}"))
        })?;

        self.build_quote(direction, amount, total, impact, QuoteSource::Contract)
    }

    async fn fallback_quote(
        &self,
        ctx: &ChainContext,
        direction: TradeDirection,
        amount: Decimal,
    ) -> Result<TradeQuote, QuoteError> {
        let price_raw = self.reader.current_price(ctx.market).await?;
        let current_price = units::from_wei(price_raw)
            .map_err(|e| QuoteError::ImplausibleResult(e.to_string()))?;

        let estimate = fallback::estimate(direction, amount, current_price, &self.policy.fallback)
            .ok_or_else(|| {
                QuoteError::ImplausibleResult(format!(
                    "approximation overflow for {amount} at spot {current_price}"
                ))
            })?;

        tracing::debug!(
            model = ?estimate.model,
            total = %estimate.total,
            impact = %estimate.impact_percent,
            spot = %current_price,
            "Fallback estimate"
        );

        let total = estimate.total.max(Decimal::ZERO);
        self.check_ceiling(total)?;
        self.build_quote(direction, amount, total, estimate.impact_percent, QuoteSource::Fallback)
    }

    fn check_ceiling(&self, total: Decimal) -> Result<(), QuoteError> {
        if total.is_sign_negative() && !total.is_zero() {
            return Err(QuoteError::ImplausibleResult(format!("negative total {total}")));
        }
        if total > self.policy.sanity_ceiling {
            return Err(QuoteError::ImplausibleResult(format!(
                "total {total} exceeds ceiling {}",
                self.policy.sanity_ceiling
            )));
        }
        Ok(())
    }

    fn build_quote(
        &self,
        direction: TradeDirection,
        amount: Decimal,
        total: Decimal,
        impact: Decimal,
        source: QuoteSource,
    ) -> Result<TradeQuote, QuoteError> {
        let cost_or_proceeds =
            units::to_wei(total).map_err(|e| QuoteError::ImplausibleResult(e.to_string()))?;
        let price_impact_percent = impact
            .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0);

        Ok(TradeQuote {
            direction,
            amount_in: amount,
            cost_or_proceeds,
            price_impact_percent,
            source,
            quoted_at: Utc::now(),
        })
    }
}

/// Deviation of the average execution price (`total / amount`) from spot, in
/// percent, floored at zero. `None` on arithmetic overflow.
pub fn average_price_impact(
    direction: TradeDirection,
    total: Decimal,
    amount: Decimal,
    current_price: Decimal,
) -> Option<Decimal> {
    let avg_price = total.checked_div(amount)?;
    let moved = match direction {
        TradeDirection::Buy => avg_price.checked_sub(current_price)?,
        TradeDirection::Sell => current_price.checked_sub(avg_price)?,
    };
    let impact = moved
        .checked_div(current_price)?
        .checked_mul(Decimal::ONE_HUNDRED)?;
    Some(impact.max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_buy_impact() {
        // paid 110 for 100 at spot 1 → avg 1.1 → 10%
        let impact = average_price_impact(TradeDirection::Buy, d("110"), d("100"), d("1")).unwrap();
        assert_eq!(impact, d("10"));
    }

    #[test]
    fn test_sell_impact() {
        // received 90 for 100 at spot 1 → avg 0.9 → 10%
        let impact = average_price_impact(TradeDirection::Sell, d("90"), d("100"), d("1")).unwrap();
        assert_eq!(impact, d("10"));
    }

    #[test]
    fn test_favourable_fill_floors_at_zero() {
        let impact = average_price_impact(TradeDirection::Buy, d("90"), d("100"), d("1")).unwrap();
        assert_eq!(impact, Decimal::ZERO);
    }

    #[test]
    fn test_impact_overflow_is_none() {
        let tiny_spot = Decimal::new(1, 28);
        assert!(average_price_impact(TradeDirection::Buy, d("1000000"), d("0.000001"), tiny_spot).is_none());
    }
}
