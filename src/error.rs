//! Error handling for stockfolio
//!
//! Defines the typed error taxonomy returned by the ledger, holdings,
//! validation and valuation modules, and a unified Result type using
//! anyhow for context chaining in the I/O layers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Core error types for portfolio operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortfolioError {
    /// Non-positive quantity/price, malformed ticker or unresolved price.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("insufficient shares of {ticker}: requested {requested}, available {available}")]
    InsufficientShares {
        ticker: String,
        available: Decimal,
        requested: Decimal,
    },

    /// A SELL reached the lot ledger with no open lots left to match.
    /// Admission validation should make this unreachable.
    #[error(
        "ledger oversold for {ticker}: sell #{sequence} on {date} exceeds open lots by {deficit}"
    )]
    OversoldLedgerState {
        ticker: String,
        date: NaiveDate,
        sequence: i64,
        deficit: Decimal,
    },

    #[error("price unavailable for {ticker}: {reason}")]
    PriceUnavailable { ticker: String, reason: String },

    #[error("portfolio '{name}' already exists for user '{user}'")]
    DuplicatePortfolio { user: String, name: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stock {ticker} is still referenced by {transactions} transaction(s)")]
    StockInUse { ticker: String, transactions: i64 },
}

impl PortfolioError {
    /// Whether the caller can recover by rejecting the request.
    ///
    /// `OversoldLedgerState` means persisted history is inconsistent and
    /// is reported as an internal fault instead.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PortfolioError::OversoldLedgerState { .. })
    }
}

/// Result type for the pure ledger/holdings/valuation computations
pub type LedgerResult<T> = std::result::Result<T, PortfolioError>;

/// Result type alias for portfolio operations touching I/O
pub type Result<T> = anyhow::Result<T>;
