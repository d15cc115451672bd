use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::TransactionType;
use crate::error::LedgerResult;
use crate::money::{self, normalize_ticker, validate_price, validate_quantity, Money, Quantity};

/// Sequence for a candidate that has not been assigned an id yet; sorts
/// after every persisted record with the same date.
pub const PENDING_SEQUENCE: i64 = i64::MAX;

/// A validated buy or sell, ready to enter the lot ledger.
///
/// Only constructible through [`TransactionRecord::new`], so quantity and
/// price are always positive and the ticker is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Insertion sequence (persistence id); breaks ties between equal dates
    pub sequence: i64,
    pub ticker: String,
    pub direction: TransactionType,
    pub quantity: Quantity,
    pub price: Money,
    pub effective_date: NaiveDate,
}

impl TransactionRecord {
    pub fn new(
        sequence: i64,
        ticker: &str,
        direction: TransactionType,
        quantity: Quantity,
        price: Money,
        effective_date: NaiveDate,
    ) -> LedgerResult<Self> {
        let record = Self {
            sequence,
            ticker: normalize_ticker(ticker)?,
            direction,
            quantity: validate_quantity(quantity)?,
            price: validate_price(price)?,
            effective_date,
        };
        record.gross_amount()?;
        Ok(record)
    }

    pub fn is_buy(&self) -> bool {
        self.direction == TransactionType::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.direction == TransactionType::Sell
    }

    /// Gross amount (quantity x price), unrounded
    pub fn gross_amount(&self) -> LedgerResult<Money> {
        money::gross_amount(self.quantity, self.price)
    }

    /// Key that defines ledger order: date first, then insertion sequence
    pub fn ordering_key(&self) -> (NaiveDate, i64) {
        (self.effective_date, self.sequence)
    }
}

/// Sort records into ledger order (effective date, then sequence).
pub fn order_records(records: &mut [TransactionRecord]) {
    records.sort_by_key(TransactionRecord::ordering_key);
}
