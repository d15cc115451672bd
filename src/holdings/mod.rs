//! Holdings aggregation
//!
//! Partitions a portfolio's transaction set by ticker, replays the lot
//! ledger per ticker and summarizes what is still held. Pure functions;
//! caching lives in [`cache`].

pub mod cache;

use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::LedgerResult;
use crate::ledger::{replay, LedgerMode, LedgerOutcome, Lot, SaleMatch, TransactionRecord};
use crate::money::{Money, Quantity};

/// Current position in one ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingsSnapshot {
    pub ticker: String,
    pub quantity: Quantity,
    pub total_cost: Money,
    /// None when quantity is zero
    pub average_cost: Option<Money>,
    pub last_activity_date: NaiveDate,
    pub open_lots: usize,
}

impl HoldingsSnapshot {
    fn from_outcome(outcome: &LedgerOutcome) -> Option<Self> {
        let quantity = outcome.remaining_quantity();
        if quantity <= Decimal::ZERO {
            return None;
        }
        Some(Self {
            ticker: outcome.ticker.clone(),
            quantity,
            total_cost: outcome.total_cost(),
            average_cost: outcome.average_cost(),
            last_activity_date: outcome.last_activity_date?,
            open_lots: outcome.open_lots.len(),
        })
    }
}

/// Ticker -> snapshot, closed positions excluded
pub type Holdings = BTreeMap<String, HoldingsSnapshot>;

/// Group records by ticker (deterministic ticker order).
pub fn partition_by_ticker(records: &[TransactionRecord]) -> BTreeMap<String, Vec<TransactionRecord>> {
    records
        .iter()
        .cloned()
        .into_group_map_by(|r| r.ticker.clone())
        .into_iter()
        .collect()
}

/// Current holdings for every ticker with a non-zero position.
pub fn calculate_holdings(records: &[TransactionRecord]) -> LedgerResult<Holdings> {
    let mut holdings = Holdings::new();
    for (ticker, ticker_records) in partition_by_ticker(records) {
        let outcome = replay(&ticker, &ticker_records, LedgerMode::HoldingsOnly)?;
        if let Some(snapshot) = HoldingsSnapshot::from_outcome(&outcome) {
            holdings.insert(ticker, snapshot);
        }
    }
    Ok(holdings)
}

/// Holdings for a single ticker; None when flat or never traded.
pub fn holding_for(
    records: &[TransactionRecord],
    ticker: &str,
) -> LedgerResult<Option<HoldingsSnapshot>> {
    let ticker_records: Vec<TransactionRecord> = records
        .iter()
        .filter(|r| r.ticker == ticker)
        .cloned()
        .collect();
    if ticker_records.is_empty() {
        return Ok(None);
    }
    let outcome = replay(ticker, &ticker_records, LedgerMode::HoldingsOnly)?;
    Ok(HoldingsSnapshot::from_outcome(&outcome))
}

/// An open lot tagged with its ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenLot {
    pub ticker: String,
    #[serde(flatten)]
    pub lot: Lot,
}

/// Realized history of one ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerFifo {
    pub realized_profit: Money,
    pub sales: Vec<SaleMatch>,
}

/// FIFO result aggregated across all tickers of a transaction set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FifoReport {
    pub realized_profit: Money,
    pub open_lots: Vec<OpenLot>,
    pub tickers: BTreeMap<String, TickerFifo>,
}

/// Realized profit and remaining lots, per ticker and in total.
pub fn calculate_fifo(records: &[TransactionRecord]) -> LedgerResult<FifoReport> {
    let mut report = FifoReport {
        realized_profit: Decimal::ZERO,
        open_lots: Vec::new(),
        tickers: BTreeMap::new(),
    };

    for (ticker, ticker_records) in partition_by_ticker(records) {
        let outcome = replay(&ticker, &ticker_records, LedgerMode::Full)?;
        report.realized_profit += outcome.realized_profit;
        report
            .open_lots
            .extend(outcome.open_lots.into_iter().map(|lot| OpenLot {
                ticker: ticker.clone(),
                lot,
            }));
        report.tickers.insert(
            ticker,
            TickerFifo {
                realized_profit: outcome.realized_profit,
                sales: outcome.sales,
            },
        );
    }

    Ok(report)
}
