//! FIFO lot ledger
//!
//! Replays the ordered buy/sell history of a single ticker. Buys open lots
//! at the tail of a queue; sells consume lots from the head, realizing
//! `(sell_price - lot_cost) * matched_quantity` per lot touched.

pub mod record;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, error};

use crate::error::{LedgerResult, PortfolioError};
use crate::money::{checked_add, checked_mul, checked_sub, Money, Quantity};

pub use record::{order_records, TransactionRecord, PENDING_SEQUENCE};

/// An open (partially or fully unconsumed) purchase lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lot {
    pub remaining_quantity: Quantity,
    pub unit_cost: Money,
    pub origin_date: NaiveDate,
    /// Sequence of the BUY that opened this lot
    pub origin_sequence: i64,
}

impl Lot {
    pub fn cost(&self) -> Money {
        self.remaining_quantity * self.unit_cost
    }
}

/// A slice of a lot consumed by a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedLot {
    pub origin_date: NaiveDate,
    pub origin_sequence: i64,
    pub quantity: Quantity,
    pub unit_cost: Money,
}

/// Realized result of one SELL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleMatch {
    pub sale_date: NaiveDate,
    pub sequence: i64,
    pub quantity: Quantity,
    pub sale_price: Money,
    pub proceeds: Money,
    pub cost_basis: Money,
    pub profit_loss: Money,
    pub matched_lots: Vec<MatchedLot>,
}

/// How much bookkeeping the ledger does while replaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// Realized profit and per-sale matches
    Full,
    /// Open lots only
    HoldingsOnly,
}

/// Final state of a replayed ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerOutcome {
    pub ticker: String,
    pub realized_profit: Money,
    pub open_lots: Vec<Lot>,
    pub sales: Vec<SaleMatch>,
    pub total_bought: Quantity,
    pub total_sold: Quantity,
    pub last_activity_date: Option<NaiveDate>,
}

impl LedgerOutcome {
    pub fn remaining_quantity(&self) -> Quantity {
        self.open_lots.iter().map(|l| l.remaining_quantity).sum()
    }

    pub fn total_cost(&self) -> Money {
        self.open_lots.iter().map(Lot::cost).sum()
    }

    /// None when the position is flat
    pub fn average_cost(&self) -> Option<Money> {
        let quantity = self.remaining_quantity();
        if quantity > Decimal::ZERO {
            Some(self.total_cost() / quantity)
        } else {
            None
        }
    }
}

/// FIFO matcher for one ticker
#[derive(Debug, Clone)]
pub struct LotLedger {
    ticker: String,
    mode: LedgerMode,
    lots: VecDeque<Lot>,
    realized_profit: Money,
    sales: Vec<SaleMatch>,
    total_bought: Quantity,
    total_sold: Quantity,
    last_activity_date: Option<NaiveDate>,
}

impl LotLedger {
    pub fn new(ticker: &str, mode: LedgerMode) -> Self {
        Self {
            ticker: ticker.to_string(),
            mode,
            lots: VecDeque::new(),
            realized_profit: Decimal::ZERO,
            sales: Vec::new(),
            total_bought: Decimal::ZERO,
            total_sold: Decimal::ZERO,
            last_activity_date: None,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Apply the next record. Records must arrive in ledger order.
    pub fn apply(&mut self, record: &TransactionRecord) -> LedgerResult<()> {
        if record.ticker != self.ticker {
            return Err(PortfolioError::InvalidTransaction(format!(
                "transaction #{} for {} applied to the {} ledger",
                record.sequence, record.ticker, self.ticker
            )));
        }

        if record.is_buy() {
            self.add_purchase(record)?;
        } else {
            self.match_sale(record)?;
        }

        self.last_activity_date = Some(
            self.last_activity_date
                .map_or(record.effective_date, |d| d.max(record.effective_date)),
        );
        Ok(())
    }

    fn add_purchase(&mut self, record: &TransactionRecord) -> LedgerResult<()> {
        self.total_bought = checked_add("total bought", self.total_bought, record.quantity)?;
        self.lots.push_back(Lot {
            remaining_quantity: record.quantity,
            unit_cost: record.price,
            origin_date: record.effective_date,
            origin_sequence: record.sequence,
        });
        Ok(())
    }

    fn match_sale(&mut self, record: &TransactionRecord) -> LedgerResult<()> {
        let track = self.mode == LedgerMode::Full;
        let mut remaining = record.quantity;
        let mut profit = Decimal::ZERO;
        let mut cost_basis = Decimal::ZERO;
        let mut matched = Vec::new();

        while remaining > Decimal::ZERO {
            let Some(head) = self.lots.front_mut() else {
                error!(
                    ticker = %self.ticker,
                    sequence = record.sequence,
                    date = %record.effective_date,
                    deficit = %remaining,
                    "sell exceeds open lots"
                );
                return Err(PortfolioError::OversoldLedgerState {
                    ticker: self.ticker.clone(),
                    date: record.effective_date,
                    sequence: record.sequence,
                    deficit: remaining,
                });
            };

            let take = head.remaining_quantity.min(remaining);
            if track {
                let spread = checked_sub("price spread", record.price, head.unit_cost)?;
                let gain = checked_mul("realized profit", spread, take)?;
                profit = checked_add("realized profit", profit, gain)?;
                let cost = checked_mul("cost basis", head.unit_cost, take)?;
                cost_basis = checked_add("cost basis", cost_basis, cost)?;
                matched.push(MatchedLot {
                    origin_date: head.origin_date,
                    origin_sequence: head.origin_sequence,
                    quantity: take,
                    unit_cost: head.unit_cost,
                });
            }

            remaining -= take;
            if take == head.remaining_quantity {
                self.lots.pop_front();
            } else {
                head.remaining_quantity -= take;
            }
        }

        self.total_sold = checked_add("total sold", self.total_sold, record.quantity)?;
        if track {
            self.realized_profit = checked_add("realized profit", self.realized_profit, profit)?;
            self.sales.push(SaleMatch {
                sale_date: record.effective_date,
                sequence: record.sequence,
                quantity: record.quantity,
                sale_price: record.price,
                proceeds: record.gross_amount()?,
                cost_basis,
                profit_loss: profit,
                matched_lots: matched,
            });
        }
        Ok(())
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.lots.iter().map(|l| l.remaining_quantity).sum()
    }

    pub fn open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn realized_profit(&self) -> Money {
        self.realized_profit
    }

    pub fn finish(self) -> LedgerOutcome {
        LedgerOutcome {
            ticker: self.ticker,
            realized_profit: self.realized_profit,
            open_lots: self
                .lots
                .into_iter()
                .filter(|l| l.remaining_quantity > Decimal::ZERO)
                .collect(),
            sales: self.sales,
            total_bought: self.total_bought,
            total_sold: self.total_sold,
            last_activity_date: self.last_activity_date,
        }
    }
}

/// Replay one ticker's records (any order) and return the final ledger state.
pub fn replay(
    ticker: &str,
    records: &[TransactionRecord],
    mode: LedgerMode,
) -> LedgerResult<LedgerOutcome> {
    let mut ordered = records.to_vec();
    order_records(&mut ordered);

    let mut ledger = LotLedger::new(ticker, mode);
    for record in &ordered {
        ledger.apply(record)?;
    }

    debug!(
        ticker,
        transactions = ordered.len(),
        open_lots = ledger.lots.len(),
        "replayed lot ledger"
    );
    Ok(ledger.finish())
}
