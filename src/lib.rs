//! Stockfolio - stock portfolio tracker with FIFO cost basis
//!
//! This library records buy/sell transactions per portfolio, replays them
//! through a FIFO lot ledger to derive holdings and realized profit, and
//! values open positions against pluggable price sources.

pub mod config;
pub mod db;
pub mod error;
pub mod holdings;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod service;
pub mod utils;
pub mod validation;
pub mod valuation;

pub use error::{LedgerResult, PortfolioError};
pub use holdings::{calculate_fifo, calculate_holdings, FifoReport, Holdings, HoldingsSnapshot};
pub use ledger::{LedgerMode, LotLedger, TransactionRecord};
pub use service::PortfolioService;
