use alloy::primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;

/// Every amount crossing the chain boundary is an 18-decimal fixed-point integer.
pub const DECIMALS: u32 = 18;

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("fixed-point value {0} does not fit a decimal")]
    Overflow(U256),

    #[error("negative amount {0} cannot be encoded as fixed point")]
    Negative(Decimal),

    #[error("invalid amount: {0:?}")]
    Invalid(String),
}

/// Convert an 18-decimal fixed-point integer into a `Decimal`.
pub fn from_wei(raw: U256) -> Result<Decimal, UnitsError> {
    let value = u128::try_from(raw).map_err(|_| UnitsError::Overflow(raw))?;
    if value > MAX_MANTISSA {
        return Err(UnitsError::Overflow(raw));
    }
    Ok(Decimal::from_i128_with_scale(value as i128, DECIMALS).normalize())
}

/// Convert a non-negative `Decimal` into an 18-decimal fixed-point integer.
/// Digits beyond the 18th decimal place are rounded half-even.
pub fn to_wei(value: Decimal) -> Result<U256, UnitsError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(UnitsError::Negative(value));
    }
    let rounded = value.round_dp(DECIMALS);
    let mantissa = U256::from(rounded.mantissa().unsigned_abs());
    let shift = DECIMALS - rounded.scale();
    Ok(mantissa * U256::from(10u64).pow(U256::from(shift)))
}

/// Parse user-entered token amount text. Empty, non-numeric and non-positive
/// input is rejected.
pub fn parse_token_amount(input: &str) -> Result<Decimal, UnitsError> {
    let trimmed = input.trim();
    let amount: Decimal = trimmed
        .parse()
        .map_err(|_| UnitsError::Invalid(trimmed.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(UnitsError::Invalid(trimmed.to_string()));
    }
    Ok(amount)
}
