use alloy::primitives::Address;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::chain::ChainContext;
use crate::models::{TradeDirection, TradeQuote, TradeRequest};

use super::trade_executor::TradeError;

/// Pre-submission limits.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLimits {
    /// Share of the native balance a buy may spend; the rest pays the network
    /// fee (default 0.98).
    pub fee_reserve_ratio: Decimal,
    /// Maximum quote age accepted for execution (default 30s).
    pub quote_ttl: Duration,
}

impl Default for TradeLimits {
    fn default() -> Self {
        Self {
            fee_reserve_ratio: Decimal::new(98, 2), // 0.98
            quote_ttl: Duration::seconds(30),
        }
    }
}

/// Balances of the connected account, in native / token units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub native_balance: Decimal,
    pub token_balance: Decimal,
}

/// Checks that need no chain reads: account, amount and quote. Returns the
/// connected account and the quote on success.
pub fn check_request<'q>(
    ctx: &ChainContext,
    request: &TradeRequest,
    quote: Option<&'q TradeQuote>,
    limits: &TradeLimits,
    now: DateTime<Utc>,
) -> Result<(Address, &'q TradeQuote), TradeError> {
    // 1. Connected account
    let account = ctx.account.ok_or(TradeError::NotConnected)?;

    // 2. Positive amount
    if request.token_amount <= Decimal::ZERO {
        return Err(TradeError::InvalidAmount);
    }

    // 3. Quote exists and was computed for this exact request
    let quote = quote.ok_or(TradeError::QuoteMissing)?;
    if quote.direction != request.direction || quote.amount_in != request.token_amount {
        return Err(TradeError::QuoteMismatch);
    }

    // 4. Quote is fresh
    if !quote.is_fresh(limits.quote_ttl, now) {
        return Err(TradeError::QuoteExpired);
    }

    Ok((account, quote))
}

/// Balance checks against a fresh snapshot.
pub fn check_balances(
    request: &TradeRequest,
    quote: &TradeQuote,
    snapshot: &AccountSnapshot,
    limits: &TradeLimits,
) -> Result<(), TradeError> {
    match request.direction {
        TradeDirection::Sell => {
            if request.token_amount > snapshot.token_balance {
                return Err(TradeError::InsufficientBalance {
                    needed: request.token_amount,
                    available: snapshot.token_balance,
                });
            }
        }
        TradeDirection::Buy => {
            let spendable = snapshot.native_balance * limits.fee_reserve_ratio;
            let cost = quote.native_value();
            if cost > spendable {
                return Err(TradeError::InsufficientBalance {
                    needed: cost,
                    available: spendable,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuoteSource;
    use alloy::primitives::{address, U256};

    const MARKET: Address = address!("00000000000000000000000000000000000000aa");
    const USER: Address = address!("00000000000000000000000000000000000000bb");

    fn ctx() -> ChainContext {
        ChainContext::new(1, MARKET).with_account(USER)
    }

    fn request(direction: TradeDirection, amount: i64) -> TradeRequest {
        TradeRequest {
            direction,
            token_amount: Decimal::from(amount),
        }
    }

    fn quote(direction: TradeDirection, amount: i64, cost_wei: u128) -> TradeQuote {
        TradeQuote {
            direction,
            amount_in: Decimal::from(amount),
            cost_or_proceeds: U256::from(cost_wei),
            price_impact_percent: 1.0,
            source: QuoteSource::Contract,
            quoted_at: Utc::now(),
        }
    }

    const ONE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_request_passes() {
        let q = quote(TradeDirection::Buy, 10, ONE);
        let result = check_request(&ctx(), &request(TradeDirection::Buy, 10), Some(&q), &TradeLimits::default(), Utc::now());
        assert_eq!(result.unwrap().0, USER);
    }

    #[test]
    fn test_requires_account() {
        let q = quote(TradeDirection::Buy, 10, ONE);
        let no_account = ChainContext::new(1, MARKET);
        let result = check_request(&no_account, &request(TradeDirection::Buy, 10), Some(&q), &TradeLimits::default(), Utc::now());
        assert!(matches!(result, Err(TradeError::NotConnected)));
    }

    #[test]
    fn test_rejects_zero_amount() {
        let q = quote(TradeDirection::Buy, 0, ONE);
        let result = check_request(&ctx(), &request(TradeDirection::Buy, 0), Some(&q), &TradeLimits::default(), Utc::now());
        assert!(matches!(result, Err(TradeError::InvalidAmount)));
    }

    #[test]
    fn test_requires_matching_quote() {
        let limits = TradeLimits::default();
        let req = request(TradeDirection::Sell, 10);

        assert!(matches!(
            check_request(&ctx(), &req, None, &limits, Utc::now()),
            Err(TradeError::QuoteMissing)
        ));

        let wrong_amount = quote(TradeDirection::Sell, 11, ONE);
        assert!(matches!(
            check_request(&ctx(), &req, Some(&wrong_amount), &limits, Utc::now()),
            Err(TradeError::QuoteMismatch)
        ));

        let wrong_side = quote(TradeDirection::Buy, 10, ONE);
        assert!(matches!(
            check_request(&ctx(), &req, Some(&wrong_side), &limits, Utc::now()),
            Err(TradeError::QuoteMismatch)
        ));
    }

    #[test]
    fn test_rejects_stale_quote() {
        let q = quote(TradeDirection::Buy, 10, ONE);
        let later = Utc::now() + Duration::seconds(31);
        let result = check_request(&ctx(), &request(TradeDirection::Buy, 10), Some(&q), &TradeLimits::default(), later);
        assert!(matches!(result, Err(TradeError::QuoteExpired)));
    }

    #[test]
    fn test_sell_exceeding_token_balance() {
        let snapshot = AccountSnapshot {
            native_balance: Decimal::from(10),
            token_balance: Decimal::from(100),
        };
        let q = quote(TradeDirection::Sell, 500, ONE);
        let result = check_balances(&request(TradeDirection::Sell, 500), &q, &snapshot, &TradeLimits::default());
        assert!(matches!(result, Err(TradeError::InsufficientBalance { .. })));
    }

    #[test]
    fn test_buy_keeps_fee_reserve() {
        let snapshot = AccountSnapshot {
            native_balance: Decimal::from(100),
            token_balance: Decimal::ZERO,
        };
        let limits = TradeLimits::default();

        // 98 native is exactly spendable
        let ok = quote(TradeDirection::Buy, 1, 98 * ONE);
        assert!(check_balances(&request(TradeDirection::Buy, 1), &ok, &snapshot, &limits).is_ok());

        // 99 eats into the fee reserve
        let too_much = quote(TradeDirection::Buy, 1, 99 * ONE);
        assert!(matches!(
            check_balances(&request(TradeDirection::Buy, 1), &too_much, &snapshot, &limits),
            Err(TradeError::InsufficientBalance { .. })
        ));
    }
}
