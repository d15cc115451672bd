//! Portfolio service: the boundary between persistence and the pure engine.
//!
//! Writes for a database are serialized with an IMMEDIATE SQLite
//! transaction held across "load history -> validate -> write", so a sell
//! is never validated against holdings another writer is changing.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{self, NewTransaction, Transaction, TransactionUpdate};
use crate::error::PortfolioError;
use crate::holdings::cache::{CachedHoldings, HoldingsCache, InMemoryHoldingsCache};
use crate::holdings::{calculate_fifo, FifoReport, Holdings};
use crate::ledger::{TransactionRecord, PENDING_SEQUENCE};
use crate::money::{normalize_ticker, round_money};
use crate::pricing::PriceSource;
use crate::validation::{validate_admission, validate_history};
use crate::valuation::{
    fetch_quotes, held_tickers, transactions_pl, value_holdings, PortfolioValuation, TransactionPl,
};

/// Fill a missing price from `source`. Call before admission, outside any lock.
pub async fn resolve_price<S>(new_tx: &mut NewTransaction, source: &S) -> Result<()>
where
    S: PriceSource + ?Sized,
{
    if new_tx.price_per_share.is_none() {
        let ticker = normalize_ticker(&new_tx.ticker)?;
        let price = source.get_price(&ticker).await?;
        debug!("Filled price for {} from quote: {}", ticker, price);
        new_tx.price_per_share = Some(price);
    }
    Ok(())
}

pub struct PortfolioService<C: HoldingsCache = InMemoryHoldingsCache> {
    conn: Connection,
    holdings: CachedHoldings<C>,
}

impl PortfolioService<InMemoryHoldingsCache> {
    pub fn new(conn: Connection) -> Self {
        Self::with_cache(conn, InMemoryHoldingsCache::new())
    }
}

impl<C: HoldingsCache> PortfolioService<C> {
    pub fn with_cache(conn: Connection, cache: C) -> Self {
        Self {
            conn,
            holdings: CachedHoldings::new(cache),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn cache(&self) -> &C {
        self.holdings.cache()
    }

    fn load_records(conn: &Connection, portfolio_id: i64) -> Result<Vec<TransactionRecord>> {
        let transactions = db::get_portfolio_transactions(conn, portfolio_id, None)?;
        Ok(db::models::to_records(&transactions)?)
    }

    fn ensure_portfolio(conn: &Connection, portfolio_id: i64) -> Result<()> {
        if db::get_portfolio_by_id(conn, portfolio_id)?.is_none() {
            return Err(PortfolioError::NotFound(format!("portfolio #{}", portfolio_id)).into());
        }
        Ok(())
    }

    /// Validate and persist a new transaction as one unit.
    pub fn admit_transaction(
        &mut self,
        portfolio_id: i64,
        new_tx: NewTransaction,
    ) -> Result<Transaction> {
        let price = new_tx.price_per_share.ok_or_else(|| {
            PortfolioError::InvalidTransaction(format!(
                "price for {} has not been resolved",
                new_tx.ticker
            ))
        })?;
        let candidate = TransactionRecord::new(
            PENDING_SEQUENCE,
            &new_tx.ticker,
            new_tx.transaction_type,
            new_tx.quantity,
            price,
            new_tx.trade_date,
        )?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to acquire write lock")?;

        Self::ensure_portfolio(&tx, portfolio_id)?;
        let existing = Self::load_records(&tx, portfolio_id)?;
        validate_admission(&existing, &candidate)?;

        db::upsert_stock(&tx, &candidate.ticker, None, None, None)?;
        let mut row = Transaction {
            id: None,
            portfolio_id,
            ticker: candidate.ticker.clone(),
            transaction_type: candidate.direction,
            trade_date: candidate.effective_date,
            quantity: candidate.quantity,
            price_per_share: candidate.price,
            total_amount: round_money(candidate.gross_amount()?),
            notes: new_tx.notes,
            created_at: Utc::now(),
        };
        row.id = Some(db::insert_transaction(&tx, &row)?);
        tx.commit().context("Failed to commit transaction")?;

        self.holdings.invalidate(portfolio_id);
        info!(
            "Admitted {} {} {} @ {} into portfolio #{}",
            row.transaction_type.as_str(),
            row.quantity,
            row.ticker,
            row.price_per_share,
            portfolio_id
        );
        Ok(row)
    }

    /// Edit a transaction; rolled back if the resulting history oversells.
    pub fn update_transaction(&mut self, id: i64, update: TransactionUpdate) -> Result<Transaction> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to acquire write lock")?;

        let mut row = db::get_transaction(&tx, id)?
            .ok_or_else(|| PortfolioError::NotFound(format!("transaction #{}", id)))?;

        if let Some(ty) = update.transaction_type {
            row.transaction_type = ty;
        }
        if let Some(quantity) = update.quantity {
            row.quantity = quantity;
        }
        if let Some(price) = update.price_per_share {
            row.price_per_share = price;
        }
        if let Some(date) = update.trade_date {
            row.trade_date = date;
        }
        if update.notes.is_some() {
            row.notes = update.notes;
        }

        let record = row.to_record()?;
        row.quantity = record.quantity;
        row.price_per_share = record.price;
        row.total_amount = round_money(record.gross_amount()?);
        db::update_transaction(&tx, &row)?;

        let history = Self::load_records(&tx, row.portfolio_id)?;
        validate_history(&history).map_err(Self::as_rejection)?;
        tx.commit().context("Failed to commit transaction update")?;

        self.holdings.invalidate(row.portfolio_id);
        info!("Updated transaction #{}", id);
        Ok(row)
    }

    /// Delete a transaction; rolled back if later sells lose their lots.
    pub fn delete_transaction(&mut self, id: i64) -> Result<Transaction> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to acquire write lock")?;

        let row = db::get_transaction(&tx, id)?
            .ok_or_else(|| PortfolioError::NotFound(format!("transaction #{}", id)))?;
        db::delete_transaction(&tx, id)?;

        let history = Self::load_records(&tx, row.portfolio_id)?;
        validate_history(&history).map_err(Self::as_rejection)?;
        tx.commit().context("Failed to commit transaction delete")?;

        self.holdings.invalidate(row.portfolio_id);
        info!("Deleted transaction #{}", id);
        Ok(row)
    }

    /// Delete a portfolio with all of its transactions.
    pub fn delete_portfolio(&mut self, portfolio_id: i64) -> Result<bool> {
        let deleted = db::delete_portfolio(&self.conn, portfolio_id)?;
        self.holdings.invalidate(portfolio_id);
        Ok(deleted)
    }

    /// An edit that would oversell is a rejected request, not a ledger fault.
    fn as_rejection(err: PortfolioError) -> PortfolioError {
        match err {
            PortfolioError::OversoldLedgerState {
                ticker,
                date,
                sequence,
                deficit,
            } => PortfolioError::InvalidTransaction(format!(
                "change would leave sell #{} of {} on {} short by {}",
                sequence, ticker, date, deficit
            )),
            other => other,
        }
    }

    // ============ Queries ============

    pub fn get_records(&self, portfolio_id: i64) -> Result<Vec<TransactionRecord>> {
        Self::ensure_portfolio(&self.conn, portfolio_id)?;
        Self::load_records(&self.conn, portfolio_id)
    }

    pub fn get_holdings(&self, portfolio_id: i64) -> Result<Arc<Holdings>> {
        let records = self.get_records(portfolio_id)?;
        Ok(self.holdings.holdings(portfolio_id, &records)?)
    }

    pub fn get_fifo_result(&self, portfolio_id: i64) -> Result<FifoReport> {
        let records = self.get_records(portfolio_id)?;
        Ok(calculate_fifo(&records)?)
    }

    pub async fn get_valuation<S>(
        &self,
        portfolio_id: i64,
        prices: Arc<S>,
    ) -> Result<PortfolioValuation>
    where
        S: PriceSource + ?Sized + 'static,
    {
        let holdings = self.get_holdings(portfolio_id)?;
        let quotes = fetch_quotes(prices, &held_tickers(&holdings)).await;
        Ok(value_holdings(&holdings, &quotes))
    }

    pub async fn get_transaction_pl<S>(
        &self,
        portfolio_id: i64,
        prices: Arc<S>,
    ) -> Result<Vec<TransactionPl>>
    where
        S: PriceSource + ?Sized + 'static,
    {
        let records = self.get_records(portfolio_id)?;
        let mut tickers: Vec<String> = records.iter().map(|r| r.ticker.clone()).collect();
        tickers.sort();
        tickers.dedup();
        let quotes = fetch_quotes(prices, &tickers).await;
        Ok(transactions_pl(&records, &quotes))
    }
}
