//! Admission checks run before a transaction is persisted.
//!
//! A SELL is admitted only if, at its slot in ledger order, the position
//! never goes negative for the rest of the history.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{LedgerResult, PortfolioError};
use crate::holdings::{holding_for, partition_by_ticker};
use crate::ledger::{order_records, replay, LedgerMode, TransactionRecord};
use crate::money::{checked_add, checked_sub, Quantity};

/// Quantity that can be sold at `(date, sequence)` without driving any
/// later point of the ticker's history below zero.
pub fn available_to_sell(
    records: &[TransactionRecord],
    ticker: &str,
    date: NaiveDate,
    sequence: i64,
) -> LedgerResult<Quantity> {
    let mut ordered: Vec<TransactionRecord> = records
        .iter()
        .filter(|r| r.ticker == ticker && r.sequence != sequence)
        .cloned()
        .collect();
    order_records(&mut ordered);

    let slot = (date, sequence);
    let mut position = Decimal::ZERO;
    let mut available: Option<Quantity> = None;

    for record in &ordered {
        if available.is_none() && record.ordering_key() > slot {
            available = Some(position);
        }
        position = if record.is_buy() {
            checked_add("position", position, record.quantity)?
        } else {
            checked_sub("position", position, record.quantity)?
        };
        if let Some(min) = available.as_mut() {
            *min = (*min).min(position);
        }
    }

    Ok(available.unwrap_or(position).max(Decimal::ZERO))
}

/// Reject a sell larger than the current holdings of `ticker`.
pub fn validate_sell(
    records: &[TransactionRecord],
    ticker: &str,
    requested: Quantity,
) -> LedgerResult<()> {
    let available = holding_for(records, ticker)?
        .map(|h| h.quantity)
        .unwrap_or(Decimal::ZERO);

    if requested > available {
        warn!(ticker, %requested, %available, "sell rejected: insufficient shares");
        return Err(PortfolioError::InsufficientShares {
            ticker: ticker.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

/// Check a candidate against the existing (not yet including it) history.
pub fn validate_admission(
    existing: &[TransactionRecord],
    candidate: &TransactionRecord,
) -> LedgerResult<()> {
    if candidate.is_buy() {
        return Ok(());
    }

    // Fails fast on a history that is already inconsistent.
    validate_sell(existing, &candidate.ticker, Decimal::ZERO)?;

    let available = available_to_sell(
        existing,
        &candidate.ticker,
        candidate.effective_date,
        candidate.sequence,
    )?;
    debug!(
        ticker = %candidate.ticker,
        date = %candidate.effective_date,
        %available,
        requested = %candidate.quantity,
        "validating sell"
    );
    if candidate.quantity > available {
        warn!(
            ticker = %candidate.ticker,
            requested = %candidate.quantity,
            %available,
            "sell rejected: insufficient shares"
        );
        return Err(PortfolioError::InsufficientShares {
            ticker: candidate.ticker.clone(),
            available,
            requested: candidate.quantity,
        });
    }
    Ok(())
}

/// Replay every ticker; surfaces the first oversold point, if any.
pub fn validate_history(records: &[TransactionRecord]) -> LedgerResult<()> {
    for (ticker, ticker_records) in partition_by_ticker(records) {
        replay(&ticker, &ticker_records, LedgerMode::HoldingsOnly)?;
    }
    Ok(())
}
