//! Formatting helpers for terminal output.
//!
//! Amounts are shown in US dollar convention: `,` groups thousands and `.`
//! separates cents.

use rust_decimal::Decimal;

use crate::money::{round_money, MONEY_DISPLAY_SCALE};

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "$" prefix
    Usd,
    /// No currency symbol (for table cells next to a currency header)
    None,
}

/// Core formatting function with full control over output.
///
/// # Examples
/// ```
/// use stockfolio::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Usd),
///     "$1,234.56"
/// );
/// assert_eq!(
///     format_currency_with_width(dec!(-1234), 12, CurrencySymbol::None),
///     "   -1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let rounded = round_money(value);
    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    let formatted = format!("{:.*}", MONEY_DISPLAY_SCALE as usize, rounded.abs());
    let (integer_part, cents) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let prefix = match symbol {
        CurrencySymbol::Usd => "$",
        CurrencySymbol::None => "",
    };
    let result = format!("{}{}{}.{}", sign, prefix, group_thousands(integer_part), cents);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// "$1,234.56"
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Usd)
}

/// Currency or "N/A" for an unknown value
pub fn format_optional_currency(value: Option<Decimal>) -> String {
    value.map(format_currency).unwrap_or_else(|| "N/A".to_string())
}

/// Signed percentage with two places, "N/A" when unknown
pub fn format_percent(value: Option<Decimal>) -> String {
    match value {
        Some(pct) => {
            let pct = round_money(pct);
            let sign = if pct >= Decimal::ZERO { "+" } else { "" };
            format!("{}{:.2}%", sign, pct)
        }
        None => "N/A".to_string(),
    }
}

/// Quantity without trailing zeros: 10.50000000 -> "10.5"
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}
