use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::TradeDirection;

/// Constants of the local curve approximation. They are tuning knobs, not
/// properties of any deployed curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    /// Per-unit price move as a fraction of spot (default 1%).
    pub slope_per_unit: Decimal,
    /// Sell average price never drops below `spot * sell_floor_ratio` (default 0.7).
    pub sell_floor_ratio: Decimal,
    /// Below this spot price the flat slippage model is used (default 0.0001).
    pub micro_price_threshold: Decimal,
    /// Impact reported by the flat slippage model (default 10%).
    pub micro_impact_percent: Decimal,
    /// Buy cost quoted while the curve is unseeded (default 0.0001 native).
    pub unseeded_buy_cost: Decimal,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            slope_per_unit: Decimal::new(1, 2),        // 0.01
            sell_floor_ratio: Decimal::new(7, 1),      // 0.7
            micro_price_threshold: Decimal::new(1, 4), // 0.0001
            micro_impact_percent: Decimal::TEN,
            unseeded_buy_cost: Decimal::new(1, 4), // 0.0001
        }
    }
}

/// Which branch of the approximation produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackModel {
    Unseeded,
    FlatSlippage,
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Native cost (buy) or proceeds (sell), unclamped.
    pub total: Decimal,
    pub impact_percent: Decimal,
    pub model: FallbackModel,
}

/// Approximate a trade against a linear curve anchored at `current_price`.
/// Returns `None` if the arithmetic overflows.
pub fn estimate(
    direction: TradeDirection,
    amount: Decimal,
    current_price: Decimal,
    policy: &FallbackPolicy,
) -> Option<Estimate> {
    if current_price.is_zero() {
        let total = match direction {
            TradeDirection::Buy => policy.unseeded_buy_cost,
            TradeDirection::Sell => Decimal::ZERO,
        };
        return Some(Estimate {
            total,
            impact_percent: Decimal::ZERO,
            model: FallbackModel::Unseeded,
        });
    }

    if current_price < policy.micro_price_threshold {
        return Some(Estimate {
            total: amount.checked_mul(current_price)?,
            impact_percent: policy.micro_impact_percent,
            model: FallbackModel::FlatSlippage,
        });
    }

    let delta = current_price.checked_mul(policy.slope_per_unit)?;
    let half_move = amount.checked_mul(delta)?.checked_div(Decimal::TWO)?;

    let avg_price = match direction {
        TradeDirection::Buy => current_price.checked_add(half_move)?,
        TradeDirection::Sell => {
            let floor = current_price.checked_mul(policy.sell_floor_ratio)?;
            (current_price - half_move).max(floor)
        }
    };

    let moved = match direction {
        TradeDirection::Buy => avg_price - current_price,
        TradeDirection::Sell => current_price - avg_price,
    };
    let impact_percent = moved
        .checked_div(current_price)?
        .checked_mul(Decimal::ONE_HUNDRED)?
        .max(Decimal::ZERO);

    Some(Estimate {
        total: amount.checked_mul(avg_price)?,
        impact_percent,
        model: FallbackModel::Linear,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_unseeded_buy_is_fixed_positive() {
        let policy = FallbackPolicy::default();
        for amount in ["0.001", "1", "1000000"] {
            let est = estimate(TradeDirection::Buy, d(amount), Decimal::ZERO, &policy).unwrap();
            assert_eq!(est.total, policy.unseeded_buy_cost);
            assert!(est.total > Decimal::ZERO);
            assert_eq!(est.model, FallbackModel::Unseeded);
        }
    }

    #[test]
    fn test_unseeded_sell_is_zero() {
        let est = estimate(TradeDirection::Sell, d("5"), Decimal::ZERO, &FallbackPolicy::default())
            .unwrap();
        assert_eq!(est.total, Decimal::ZERO);
        assert_eq!(est.impact_percent, Decimal::ZERO);
    }

    #[test]
    fn test_micro_price_uses_flat_slippage() {
        let est = estimate(TradeDirection::Buy, d("1"), d("0.00001"), &FallbackPolicy::default())
            .unwrap();
        assert_eq!(est.model, FallbackModel::FlatSlippage);
        assert_eq!(est.total, d("0.00001"));
        assert_eq!(est.impact_percent, Decimal::TEN);
    }

    #[test]
    fn test_linear_buy() {
        // delta = 1 * 0.01 = 0.01; avg = 1 + 10 * 0.01 / 2 = 1.05; total = 10.5
        let est = estimate(TradeDirection::Buy, d("10"), d("1"), &FallbackPolicy::default()).unwrap();
        assert_eq!(est.model, FallbackModel::Linear);
        assert_eq!(est.total, d("10.5"));
        assert_eq!(est.impact_percent, d("5"));
    }

    #[test]
    fn test_linear_sell() {
        // avg = 2 - 10 * 0.02 / 2 = 1.9; total = 19
        let est = estimate(TradeDirection::Sell, d("10"), d("2"), &FallbackPolicy::default()).unwrap();
        assert_eq!(est.total, d("19"));
        assert_eq!(est.impact_percent, d("5"));
    }

    #[test]
    fn test_sell_average_never_below_floor() {
        let policy = FallbackPolicy::default();
        let price = d("0.5");
        for amount in ["1", "59", "60", "61", "1000", "123456"] {
            let amount = d(amount);
            let est = estimate(TradeDirection::Sell, amount, price, &policy).unwrap();
            let avg = est.total / amount;
            assert!(avg >= price * policy.sell_floor_ratio, "avg {avg} for {amount}");
            assert!(est.impact_percent <= d("30"));
        }
    }

    #[test]
    fn test_overflow_returns_none() {
        let huge = Decimal::MAX;
        assert!(estimate(TradeDirection::Buy, huge, d("1000"), &FallbackPolicy::default()).is_none());
    }
}
