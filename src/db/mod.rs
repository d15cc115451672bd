// Database module - SQLite connection and models

pub mod models;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::PortfolioError;
use crate::money::{normalize_ticker, validate_price};
pub use models::{
    NewTransaction, Portfolio, PriceHistory, Stock, Transaction, TransactionType,
    TransactionUpdate,
};

/// Get the default database path (~/.stockfolio/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let data_dir = PathBuf::from(home).join(".stockfolio");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&data_dir).context("Failed to create .stockfolio directory")?;

    Ok(data_dir.join("data.db"))
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    // Concurrent writers queue on the IMMEDIATE lock instead of failing
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;

    Ok(conn)
}

/// Apply the schema to an open connection (idempotent)
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")
}

/// Initialize the database with schema
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create database directory {:?}", parent))?;
    }

    info!("Initializing database at: {:?}", path);
    let conn = open_db(Some(path))?;
    apply_schema(&conn)?;
    Ok(())
}

/// Helper to read Decimal from SQLite (handles both INTEGER and TEXT)
pub fn get_decimal_value(row: &Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    // Try to get as String first (for TEXT storage)
    if let Ok(s) = row.get::<_, String>(idx) {
        return Decimal::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)));
    }

    // Fall back to i64 (for INTEGER storage due to SQLite type affinity)
    if let Ok(i) = row.get::<_, i64>(idx) {
        return Ok(Decimal::from(i));
    }

    Err(rusqlite::Error::InvalidColumnType(
        idx,
        "decimal".to_string(),
        rusqlite::types::Type::Null,
    ))
}

fn get_optional_decimal(row: &Row, idx: usize) -> Result<Option<Decimal>, rusqlite::Error> {
    match row.get_ref(idx)? {
        rusqlite::types::ValueRef::Null => Ok(None),
        _ => get_decimal_value(row, idx).map(Some),
    }
}

// ============ Portfolios ============

fn portfolio_from_row(row: &Row) -> Result<Portfolio, rusqlite::Error> {
    Ok(Portfolio {
        id: Some(row.get(0)?),
        user_name: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const PORTFOLIO_COLUMNS: &str = "id, user_name, name, description, created_at, updated_at";

/// Create a portfolio; names are unique per user
pub fn create_portfolio(
    conn: &Connection,
    user_name: &str,
    name: &str,
    description: Option<&str>,
) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PortfolioError::InvalidTransaction("portfolio name cannot be empty".to_string()).into());
    }
    if get_portfolio(conn, user_name, name)?.is_some() {
        return Err(PortfolioError::DuplicatePortfolio {
            user: user_name.to_string(),
            name: name.to_string(),
        }
        .into());
    }

    let now = Utc::now();
    conn.execute(
        "INSERT INTO portfolios (user_name, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_name, name, description, now, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_portfolio(conn: &Connection, user_name: &str, name: &str) -> Result<Option<Portfolio>> {
    let sql = format!(
        "SELECT {} FROM portfolios WHERE user_name = ?1 AND name = ?2",
        PORTFOLIO_COLUMNS
    );
    let portfolio = conn
        .query_row(&sql, params![user_name, name.trim()], portfolio_from_row)
        .optional()?;
    Ok(portfolio)
}

pub fn get_portfolio_by_id(conn: &Connection, id: i64) -> Result<Option<Portfolio>> {
    let sql = format!("SELECT {} FROM portfolios WHERE id = ?1", PORTFOLIO_COLUMNS);
    Ok(conn.query_row(&sql, [id], portfolio_from_row).optional()?)
}

/// Look up a portfolio by name or fail with NotFound
pub fn require_portfolio(conn: &Connection, user_name: &str, name: &str) -> Result<Portfolio> {
    get_portfolio(conn, user_name, name)?.ok_or_else(|| {
        PortfolioError::NotFound(format!("portfolio '{}' for user '{}'", name, user_name)).into()
    })
}

pub fn list_portfolios(conn: &Connection, user_name: &str) -> Result<Vec<Portfolio>> {
    let sql = format!(
        "SELECT {} FROM portfolios WHERE user_name = ?1 ORDER BY name ASC",
        PORTFOLIO_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let portfolios = stmt
        .query_map([user_name], portfolio_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(portfolios)
}

/// Rename and/or re-describe a portfolio
pub fn update_portfolio(
    conn: &Connection,
    id: i64,
    new_name: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let current = get_portfolio_by_id(conn, id)?
        .ok_or_else(|| PortfolioError::NotFound(format!("portfolio #{}", id)))?;

    let name = new_name.map(str::trim).unwrap_or(current.name.as_str());
    if name.is_empty() {
        return Err(PortfolioError::InvalidTransaction("portfolio name cannot be empty".to_string()).into());
    }
    if let Some(existing) = get_portfolio(conn, &current.user_name, name)? {
        if existing.id != Some(id) {
            return Err(PortfolioError::DuplicatePortfolio {
                user: current.user_name.clone(),
                name: name.to_string(),
            }
            .into());
        }
    }

    let description = description.or(current.description.as_deref());
    conn.execute(
        "UPDATE portfolios SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
        params![name, description, Utc::now(), id],
    )?;
    Ok(())
}

/// Delete a portfolio and (via cascade) its transactions
pub fn delete_portfolio(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM portfolios WHERE id = ?1", [id])?;
    Ok(affected > 0)
}

// ============ Stocks & prices ============

fn stock_from_row(row: &Row) -> Result<Stock, rusqlite::Error> {
    Ok(Stock {
        id: Some(row.get(0)?),
        ticker: row.get(1)?,
        name: row.get(2)?,
        sector: row.get(3)?,
        industry: row.get(4)?,
        current_price: get_optional_decimal(row, 5)?,
        last_updated: row.get(6)?,
    })
}

/// Insert or get stock, returns stock id. Provided metadata overwrites.
pub fn upsert_stock(
    conn: &Connection,
    ticker: &str,
    name: Option<&str>,
    sector: Option<&str>,
    industry: Option<&str>,
) -> Result<i64> {
    let ticker = normalize_ticker(ticker)?;

    let existing: Option<i64> = conn
        .query_row("SELECT id FROM stocks WHERE ticker = ?1", [&ticker], |row| row.get(0))
        .optional()?;

    if let Some(id) = existing {
        conn.execute(
            "UPDATE stocks SET
                name = COALESCE(?1, name),
                sector = COALESCE(?2, sector),
                industry = COALESCE(?3, industry)
             WHERE id = ?4",
            params![name, sector, industry, id],
        )?;
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO stocks (ticker, name, sector, industry, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![ticker, name, sector, industry, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_stock(conn: &Connection, ticker: &str) -> Result<Option<Stock>> {
    let ticker = normalize_ticker(ticker)?;
    Ok(conn
        .query_row(
            "SELECT id, ticker, name, sector, industry, current_price, last_updated
             FROM stocks WHERE ticker = ?1",
            [ticker],
            stock_from_row,
        )
        .optional()?)
}

pub fn list_stocks(conn: &Connection) -> Result<Vec<Stock>> {
    let mut stmt = conn.prepare(
        "SELECT id, ticker, name, sector, industry, current_price, last_updated
         FROM stocks ORDER BY ticker ASC",
    )?;
    let stocks = stmt
        .query_map([], stock_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stocks)
}

/// Remove a stock and its price history. Refused while any transaction
/// references the ticker.
pub fn delete_stock(conn: &Connection, ticker: &str) -> Result<bool> {
    let ticker = normalize_ticker(ticker)?;
    let transactions: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE ticker = ?1",
        [&ticker],
        |row| row.get(0),
    )?;
    if transactions > 0 {
        return Err(PortfolioError::StockInUse {
            ticker,
            transactions,
        }
        .into());
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM price_history WHERE ticker = ?1", [&ticker])?;
    let affected = tx.execute("DELETE FROM stocks WHERE ticker = ?1", [&ticker])?;
    tx.commit()?;
    Ok(affected > 0)
}

/// Record a quote: upserts price history and refreshes `stocks.current_price`
pub fn set_stock_price(
    conn: &Connection,
    ticker: &str,
    price: Decimal,
    price_date: NaiveDate,
) -> Result<()> {
    let ticker = normalize_ticker(ticker)?;
    let price = validate_price(price)?;
    upsert_stock(conn, &ticker, None, None, None)?;

    let now = Utc::now();
    conn.execute(
        "INSERT OR REPLACE INTO price_history (ticker, price_date, price, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![ticker, price_date, price.to_string(), now],
    )?;

    // current_price tracks the most recent dated quote
    conn.execute(
        "UPDATE stocks SET
            current_price = (SELECT price FROM price_history
                             WHERE ticker = ?1 ORDER BY price_date DESC LIMIT 1),
            last_updated = ?2
         WHERE ticker = ?1",
        params![ticker, now],
    )?;

    info!("Recorded {} price {} for {}", ticker, price, price_date);
    Ok(())
}

pub fn get_price_history(conn: &Connection, ticker: &str) -> Result<Vec<PriceHistory>> {
    let ticker = normalize_ticker(ticker)?;
    let mut stmt = conn.prepare(
        "SELECT id, ticker, price_date, price, created_at
         FROM price_history WHERE ticker = ?1 ORDER BY price_date ASC",
    )?;
    let history = stmt
        .query_map([ticker], |row| {
            Ok(PriceHistory {
                id: Some(row.get(0)?),
                ticker: row.get(1)?,
                price_date: row.get(2)?,
                price: get_decimal_value(row, 3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(history)
}

/// Latest known quote per ticker (tickers without a quote are absent)
pub fn get_current_prices(conn: &Connection) -> Result<HashMap<String, Decimal>> {
    let mut stmt =
        conn.prepare("SELECT ticker, current_price FROM stocks WHERE current_price IS NOT NULL")?;
    let prices = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, get_decimal_value(row, 1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(prices)
}

// ============ Transactions ============

const TRANSACTION_COLUMNS: &str = "id, portfolio_id, ticker, transaction_type, trade_date,
    quantity, price_per_share, total_amount, notes, created_at";

fn transaction_from_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let type_str: String = row.get(3)?;
    let transaction_type = TransactionType::from_str(&type_str).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown transaction type '{}'", type_str).into(),
        )
    })?;

    Ok(Transaction {
        id: Some(row.get(0)?),
        portfolio_id: row.get(1)?,
        ticker: row.get(2)?,
        transaction_type,
        trade_date: row.get(4)?,
        quantity: get_decimal_value(row, 5)?,
        price_per_share: get_decimal_value(row, 6)?,
        total_amount: get_decimal_value(row, 7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert transaction
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (
            portfolio_id, ticker, transaction_type, trade_date,
            quantity, price_per_share, total_amount, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tx.portfolio_id,
            tx.ticker,
            tx.transaction_type.as_str(),
            tx.trade_date,
            tx.quantity.to_string(),
            tx.price_per_share.to_string(),
            tx.total_amount.to_string(),
            tx.notes,
            tx.created_at,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    Ok(conn.query_row(&sql, [id], transaction_from_row).optional()?)
}

/// All transactions of a portfolio in ledger order (trade date, then id)
pub fn get_portfolio_transactions(
    conn: &Connection,
    portfolio_id: i64,
    ticker: Option<&str>,
) -> Result<Vec<Transaction>> {
    let transactions = match ticker {
        Some(t) => {
            let ticker = normalize_ticker(t)?;
            let sql = format!(
                "SELECT {} FROM transactions
                 WHERE portfolio_id = ?1 AND ticker = ?2
                 ORDER BY trade_date ASC, id ASC",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![portfolio_id, ticker], transaction_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!(
                "SELECT {} FROM transactions
                 WHERE portfolio_id = ?1
                 ORDER BY trade_date ASC, id ASC",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([portfolio_id], transaction_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(transactions)
}

/// Overwrite the mutable columns of an existing transaction
pub fn update_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    let id = tx
        .id
        .ok_or_else(|| PortfolioError::NotFound("transaction without id".to_string()))?;
    let affected = conn.execute(
        "UPDATE transactions SET
            transaction_type = ?1, trade_date = ?2, quantity = ?3,
            price_per_share = ?4, total_amount = ?5, notes = ?6
         WHERE id = ?7",
        params![
            tx.transaction_type.as_str(),
            tx.trade_date,
            tx.quantity.to_string(),
            tx.price_per_share.to_string(),
            tx.total_amount.to_string(),
            tx.notes,
            id,
        ],
    )?;
    if affected == 0 {
        return Err(PortfolioError::NotFound(format!("transaction #{}", id)).into());
    }
    Ok(())
}

pub fn delete_transaction(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    Ok(affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    fn tx(portfolio_id: i64, ticker: &str, ty: TransactionType, qty: Decimal, d: u32) -> Transaction {
        Transaction {
            id: None,
            portfolio_id,
            ticker: ticker.to_string(),
            transaction_type: ty,
            trade_date: NaiveDate::from_ymd_opt(2025, 5, d).unwrap(),
            quantity: qty,
            price_per_share: dec!(10),
            total_amount: qty * dec!(10),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_portfolio_names_unique_per_user() {
        let conn = memory_db();
        create_portfolio(&conn, "alice", "Growth", None).unwrap();
        create_portfolio(&conn, "bob", "Growth", None).unwrap();

        let err = create_portfolio(&conn, "alice", "Growth", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PortfolioError>(),
            Some(PortfolioError::DuplicatePortfolio { .. })
        ));
        assert_eq!(list_portfolios(&conn, "alice").unwrap().len(), 1);
    }

    #[test]
    fn test_rename_portfolio_checks_duplicates() {
        let conn = memory_db();
        let a = create_portfolio(&conn, "alice", "A", None).unwrap();
        create_portfolio(&conn, "alice", "B", None).unwrap();

        assert!(update_portfolio(&conn, a, Some("B"), None).is_err());
        update_portfolio(&conn, a, Some("C"), Some("renamed")).unwrap();
        let renamed = get_portfolio_by_id(&conn, a).unwrap().unwrap();
        assert_eq!(renamed.name, "C");
        assert_eq!(renamed.description.as_deref(), Some("renamed"));
    }

    #[test]
    fn test_transactions_read_back_in_ledger_order() {
        let conn = memory_db();
        let pid = create_portfolio(&conn, "alice", "Main", None).unwrap();
        upsert_stock(&conn, "AAPL", None, None, None).unwrap();
        upsert_stock(&conn, "MSFT", None, None, None).unwrap();

        let late = insert_transaction(&conn, &tx(pid, "AAPL", TransactionType::Buy, dec!(1), 9)).unwrap();
        let early = insert_transaction(&conn, &tx(pid, "AAPL", TransactionType::Buy, dec!(2.5), 1)).unwrap();
        insert_transaction(&conn, &tx(pid, "MSFT", TransactionType::Buy, dec!(3), 5)).unwrap();

        let all = get_portfolio_transactions(&conn, pid, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, Some(early));
        assert_eq!(all[0].quantity, dec!(2.5));
        assert_eq!(all[2].id, Some(late));

        let aapl = get_portfolio_transactions(&conn, pid, Some("aapl")).unwrap();
        assert_eq!(aapl.len(), 2);
    }

    #[test]
    fn test_delete_portfolio_cascades() {
        let conn = memory_db();
        let pid = create_portfolio(&conn, "alice", "Main", None).unwrap();
        upsert_stock(&conn, "AAPL", None, None, None).unwrap();
        let id = insert_transaction(&conn, &tx(pid, "AAPL", TransactionType::Buy, dec!(1), 1)).unwrap();

        assert!(delete_portfolio(&conn, pid).unwrap());
        assert!(get_transaction(&conn, id).unwrap().is_none());
    }

    #[test]
    fn test_set_stock_price_tracks_latest_date() {
        let conn = memory_db();
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();

        set_stock_price(&conn, "aapl", dec!(190.10), d2).unwrap();
        set_stock_price(&conn, "AAPL", dec!(185.00), d1).unwrap();

        let stock = get_stock(&conn, "AAPL").unwrap().unwrap();
        assert_eq!(stock.current_price, Some(dec!(190.10)));
        assert_eq!(get_price_history(&conn, "AAPL").unwrap().len(), 2);
        assert_eq!(get_current_prices(&conn).unwrap()["AAPL"], dec!(190.10));
    }

    #[test]
    fn test_set_stock_price_rejects_non_positive() {
        let conn = memory_db();
        let d = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert!(set_stock_price(&conn, "AAPL", dec!(0), d).is_err());
    }

    #[test]
    fn test_delete_stock_refused_while_referenced() {
        let conn = memory_db();
        let pid = create_portfolio(&conn, "alice", "Main", None).unwrap();
        upsert_stock(&conn, "AAPL", None, None, None).unwrap();
        insert_transaction(&conn, &tx(pid, "AAPL", TransactionType::Buy, dec!(1), 1)).unwrap();

        let err = delete_stock(&conn, "aapl").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PortfolioError>(),
            Some(PortfolioError::StockInUse { transactions: 1, .. })
        ));
        assert!(get_stock(&conn, "AAPL").unwrap().is_some());
    }

    #[test]
    fn test_delete_stock_removes_price_history() {
        let conn = memory_db();
        let d = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        set_stock_price(&conn, "MSFT", dec!(410.5), d).unwrap();

        assert!(delete_stock(&conn, "MSFT").unwrap());
        assert!(get_stock(&conn, "MSFT").unwrap().is_none());
        assert!(get_price_history(&conn, "MSFT").unwrap().is_empty());
        assert!(!delete_stock(&conn, "MSFT").unwrap());
    }

    #[test]
    fn test_upsert_stock_keeps_metadata() {
        let conn = memory_db();
        let id = upsert_stock(&conn, "AAPL", Some("Apple Inc."), Some("Technology"), None).unwrap();
        let again = upsert_stock(&conn, "aapl", None, None, Some("Consumer Electronics")).unwrap();
        assert_eq!(id, again);

        let stock = get_stock(&conn, "AAPL").unwrap().unwrap();
        assert_eq!(stock.name.as_deref(), Some("Apple Inc."));
        assert_eq!(stock.industry.as_deref(), Some("Consumer Electronics"));
        assert_eq!(stock.current_price, None);
    }
}
