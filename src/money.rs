//! Exact decimal value types for prices, amounts and share counts.
//!
//! Everything that has to balance is a `rust_decimal::Decimal`; binary
//! floats never enter a money or quantity path.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerResult, PortfolioError};

/// Currency amount (unit price, cost, proceeds, P&L)
pub type Money = Decimal;

/// Share count; fractional shares are allowed
pub type Quantity = Decimal;

/// Maximum fractional digits accepted for a unit price
pub const PRICE_SCALE: u32 = 4;

/// Maximum fractional digits accepted for a share quantity
pub const QUANTITY_SCALE: u32 = 8;

/// Fractional digits used when presenting or persisting amounts
pub const MONEY_DISPLAY_SCALE: u32 = 2;

/// Longest ticker symbol accepted
pub const MAX_TICKER_LEN: usize = 10;

/// Unit prices must stay below this (eight integer digits)
pub const MAX_PRICE: Money = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Share quantities must stay below this (ten integer digits)
pub const MAX_QUANTITY: Quantity = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// A single transaction's gross amount must stay below this (ten integer digits)
pub const MAX_TOTAL_AMOUNT: Money = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// Parse a decimal exactly, rejecting anything `Decimal` would have to round.
pub fn parse_decimal(field: &str, text: &str) -> LedgerResult<Decimal> {
    Decimal::from_str_exact(text.trim()).map_err(|_| {
        PortfolioError::InvalidTransaction(format!("{} '{}' is not a decimal number", field, text))
    })
}

/// Reject zero and negative values.
pub fn ensure_positive(field: &str, value: Decimal) -> LedgerResult<Decimal> {
    if value <= Decimal::ZERO {
        return Err(PortfolioError::InvalidTransaction(format!(
            "{} must be greater than zero (got {})",
            field, value
        )));
    }
    Ok(value)
}

fn ensure_scale(field: &str, value: Decimal, max_scale: u32) -> LedgerResult<Decimal> {
    let normalized = value.normalize();
    if normalized.scale() > max_scale {
        return Err(PortfolioError::InvalidTransaction(format!(
            "{} {} has more than {} decimal places",
            field, value, max_scale
        )));
    }
    Ok(normalized)
}

fn ensure_below(field: &str, value: Decimal, limit: Decimal) -> LedgerResult<Decimal> {
    if value >= limit {
        return Err(PortfolioError::InvalidTransaction(format!(
            "{} {} must be less than {}",
            field, value, limit
        )));
    }
    Ok(value)
}

/// Validate a unit price: positive, below `MAX_PRICE`, at most `PRICE_SCALE` decimals.
pub fn validate_price(value: Money) -> LedgerResult<Money> {
    let value = ensure_positive("price", value)?;
    let value = ensure_below("price", value, MAX_PRICE)?;
    ensure_scale("price", value, PRICE_SCALE)
}

/// Validate a share quantity: positive, below `MAX_QUANTITY`, at most `QUANTITY_SCALE` decimals.
pub fn validate_quantity(value: Quantity) -> LedgerResult<Quantity> {
    let value = ensure_positive("quantity", value)?;
    let value = ensure_below("quantity", value, MAX_QUANTITY)?;
    ensure_scale("quantity", value, QUANTITY_SCALE)
}

/// `quantity * price`, bounded by `MAX_TOTAL_AMOUNT`.
pub fn gross_amount(quantity: Quantity, price: Money) -> LedgerResult<Money> {
    let amount = checked_mul("total amount", quantity, price)?;
    ensure_below("total amount", amount, MAX_TOTAL_AMOUNT)
}

fn overflow(what: &str) -> PortfolioError {
    PortfolioError::InvalidTransaction(format!("{} is out of range", what))
}

pub fn checked_add(what: &str, a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(what))
}

pub fn checked_sub(what: &str, a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_sub(b).ok_or_else(|| overflow(what))
}

pub fn checked_mul(what: &str, a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(what))
}

/// Trim and uppercase a ticker symbol.
pub fn normalize_ticker(raw: &str) -> LedgerResult<String> {
    let ticker = raw.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(PortfolioError::InvalidTransaction(
            "ticker cannot be empty".to_string(),
        ));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(PortfolioError::InvalidTransaction(format!(
            "ticker '{}' is longer than {} characters",
            ticker, MAX_TICKER_LEN
        )));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(PortfolioError::InvalidTransaction(format!(
            "ticker '{}' contains invalid characters",
            ticker
        )));
    }
    Ok(ticker)
}

/// Round an amount for display/storage (2 places, half away from zero).
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(MONEY_DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Percentage of `part` relative to `base`, None when base is not positive.
pub fn percent_of(part: Money, base: Money) -> Option<Decimal> {
    if base > Decimal::ZERO {
        Some((part / base) * Decimal::ONE_HUNDRED)
    } else {
        None
    }
}
