use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{LedgerResult, PortfolioError};
use crate::ledger::TransactionRecord;

/// Named collection of transactions owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Option<i64>,
    pub user_name: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registered instrument with its latest known quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: Option<i64>,
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub current_price: Option<Decimal>,
    pub last_updated: DateTime<Utc>,
}

/// Transaction type (buy or sell)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "B" => Ok(TransactionType::Buy),
            "SELL" | "S" => Ok(TransactionType::Sell),
            _ => Err(()),
        }
    }
}

/// Persisted transaction row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,
    pub portfolio_id: i64,
    pub ticker: String,
    pub transaction_type: TransactionType,
    pub trade_date: NaiveDate,
    pub quantity: Decimal,
    pub price_per_share: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Convert to a ledger record; the row must already have an id.
    pub fn to_record(&self) -> LedgerResult<TransactionRecord> {
        let sequence = self.id.ok_or_else(|| {
            PortfolioError::InvalidTransaction(format!(
                "{} {} on {} has not been persisted",
                self.transaction_type.as_str(),
                self.ticker,
                self.trade_date
            ))
        })?;
        TransactionRecord::new(
            sequence,
            &self.ticker,
            self.transaction_type,
            self.quantity,
            self.price_per_share,
            self.trade_date,
        )
    }
}

/// Convert persisted rows into ledger records.
pub fn to_records(transactions: &[Transaction]) -> LedgerResult<Vec<TransactionRecord>> {
    transactions.iter().map(Transaction::to_record).collect()
}

/// Transaction submitted for admission.
///
/// `price_per_share` may be None until a price-fill step resolves it;
/// admission rejects unresolved prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub ticker: String,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub price_per_share: Option<Decimal>,
    pub trade_date: NaiveDate,
    pub notes: Option<String>,
}

/// Partial edit of an existing transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub transaction_type: Option<TransactionType>,
    pub quantity: Option<Decimal>,
    pub price_per_share: Option<Decimal>,
    pub trade_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self == &TransactionUpdate::default()
    }
}

/// Historical close recorded for a ticker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: Option<i64>,
    pub ticker: String,
    pub price_date: NaiveDate,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(id: Option<i64>) -> Transaction {
        Transaction {
            id,
            portfolio_id: 1,
            ticker: "aapl".to_string(),
            transaction_type: TransactionType::Buy,
            trade_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            quantity: dec!(3),
            price_per_share: dec!(170.25),
            total_amount: dec!(510.75),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transaction_type_parse() {
        assert_eq!("buy".parse::<TransactionType>(), Ok(TransactionType::Buy));
        assert_eq!(" SELL ".parse::<TransactionType>(), Ok(TransactionType::Sell));
        assert!("hold".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_to_record_uses_id_as_sequence() {
        let rec = sample(Some(42)).to_record().unwrap();
        assert_eq!(rec.sequence, 42);
        assert_eq!(rec.ticker, "AAPL");
    }

    #[test]
    fn test_to_record_requires_id() {
        assert!(sample(None).to_record().is_err());
    }

    #[test]
    fn test_empty_update() {
        assert!(TransactionUpdate::default().is_empty());
        let update = TransactionUpdate {
            quantity: Some(dec!(1)),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
