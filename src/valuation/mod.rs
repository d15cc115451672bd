//! Market valuation of holdings.
//!
//! Quotes are fetched first (possibly slow, never under a write lock) and
//! then combined with a holdings snapshot by pure functions. A missing
//! quote leaves value and P&L unknown; it never falls back to zero or to
//! the purchase price.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::db::TransactionType;
use crate::error::{LedgerResult, PortfolioError};
use crate::holdings::{Holdings, HoldingsSnapshot};
use crate::ledger::TransactionRecord;
use crate::money::{percent_of, Money, Quantity};
use crate::pricing::PriceSource;

/// Maximum concurrent quote requests
const MAX_CONCURRENT_REQUESTS: usize = 5;

/// Quote lookup results keyed by ticker
pub type Quotes = HashMap<String, LedgerResult<Money>>;

/// Valuation of one holding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionValuation {
    pub ticker: String,
    pub quantity: Quantity,
    pub average_cost: Option<Money>,
    pub total_cost: Money,
    pub current_price: Option<Money>,
    pub market_value: Option<Money>,
    pub unrealized_pl: Option<Money>,
    pub unrealized_pl_pct: Option<Decimal>,
    /// Why the price is unknown, when it is
    pub price_error: Option<String>,
}

/// Valuation of a whole holdings snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioValuation {
    pub positions: Vec<PositionValuation>,
    pub total_cost: Money,
    /// None if any holding is unpriced
    pub market_value: Option<Money>,
    /// None if any holding is unpriced
    pub unrealized_pl: Option<Money>,
    pub unrealized_pl_pct: Option<Decimal>,
    /// Market value of the priced holdings only
    pub priced_value: Money,
    pub unpriced: Vec<String>,
}

/// Value a single holding against an optional quote.
pub fn value_holding(snapshot: &HoldingsSnapshot, quote: &LedgerResult<Money>) -> PositionValuation {
    let (current_price, price_error) = match quote {
        Ok(price) if *price > Decimal::ZERO => (Some(*price), None),
        Ok(price) => (None, Some(format!("non-positive quote {}", price))),
        Err(e) => (None, Some(e.to_string())),
    };

    let market_value = current_price.map(|p| p * snapshot.quantity);
    let unrealized_pl = market_value.map(|v| v - snapshot.total_cost);
    let unrealized_pl_pct = unrealized_pl.and_then(|pl| percent_of(pl, snapshot.total_cost));

    PositionValuation {
        ticker: snapshot.ticker.clone(),
        quantity: snapshot.quantity,
        average_cost: snapshot.average_cost,
        total_cost: snapshot.total_cost,
        current_price,
        market_value,
        unrealized_pl,
        unrealized_pl_pct,
        price_error,
    }
}

/// Value every holding; tickers absent from `quotes` count as unavailable.
pub fn value_holdings(holdings: &Holdings, quotes: &Quotes) -> PortfolioValuation {
    let mut positions = Vec::with_capacity(holdings.len());
    let mut total_cost = Decimal::ZERO;
    let mut priced_value = Decimal::ZERO;
    let mut unpriced = Vec::new();

    for (ticker, snapshot) in holdings {
        let missing: LedgerResult<Money> = Err(PortfolioError::PriceUnavailable {
            ticker: ticker.clone(),
            reason: "no quote requested".to_string(),
        });
        let quote = quotes.get(ticker).unwrap_or(&missing);
        let position = value_holding(snapshot, quote);

        total_cost += position.total_cost;
        match position.market_value {
            Some(value) => priced_value += value,
            None => unpriced.push(ticker.clone()),
        }
        positions.push(position);
    }

    let market_value = unpriced.is_empty().then_some(priced_value);
    let unrealized_pl = market_value.map(|v| v - total_cost);
    let unrealized_pl_pct = unrealized_pl.and_then(|pl| percent_of(pl, total_cost));

    PortfolioValuation {
        positions,
        total_cost,
        market_value,
        unrealized_pl,
        unrealized_pl_pct,
        priced_value,
        unpriced,
    }
}

/// P&L of one transaction against its own price (not the average cost).
///
/// BUY: `(current - price) * quantity`. SELL: `(price - current) * quantity`,
/// the value kept by selling instead of holding. None when unpriced.
pub fn transaction_pl(record: &TransactionRecord, current_price: Option<Money>) -> Option<Money> {
    let current = current_price.filter(|p| *p > Decimal::ZERO)?;
    let diff = match record.direction {
        TransactionType::Buy => current - record.price,
        TransactionType::Sell => record.price - current,
    };
    Some(diff * record.quantity)
}

/// Per-transaction P&L line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionPl {
    pub sequence: i64,
    pub ticker: String,
    pub direction: TransactionType,
    pub quantity: Quantity,
    pub price: Money,
    pub current_price: Option<Money>,
    pub profit_loss: Option<Money>,
}

/// Transaction-level P&L for every record.
pub fn transactions_pl(records: &[TransactionRecord], quotes: &Quotes) -> Vec<TransactionPl> {
    records
        .iter()
        .map(|record| {
            let current_price = quotes
                .get(&record.ticker)
                .and_then(|q| q.as_ref().ok().copied());
            TransactionPl {
                sequence: record.sequence,
                ticker: record.ticker.clone(),
                direction: record.direction,
                quantity: record.quantity,
                price: record.price,
                current_price,
                profit_loss: transaction_pl(record, current_price),
            }
        })
        .collect()
}

/// Fetch quotes for `tickers` concurrently.
pub async fn fetch_quotes<S>(source: Arc<S>, tickers: &[String]) -> Quotes
where
    S: PriceSource + ?Sized + 'static,
{
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS));
    let mut join_set = JoinSet::new();

    for ticker in tickers.iter().cloned() {
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let quote = match semaphore.acquire_owned().await {
                Ok(_permit) => source.get_price(&ticker).await,
                Err(e) => Err(PortfolioError::PriceUnavailable {
                    ticker: ticker.clone(),
                    reason: e.to_string(),
                }),
            };
            (ticker, quote)
        });
    }

    let mut quotes = Quotes::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((ticker, quote)) => {
                if let Err(e) = &quote {
                    warn!("{}", e);
                }
                quotes.insert(ticker, quote);
            }
            Err(e) => warn!("Quote task failed: {}", e),
        }
    }

    debug!(requested = tickers.len(), received = quotes.len(), "fetched quotes");
    quotes
}

/// Tickers of a holdings map, in order
pub fn held_tickers(holdings: &Holdings) -> Vec<String> {
    holdings.keys().cloned().collect()
}

/// Group valuations by ticker for lookups
pub fn by_ticker(valuation: &PortfolioValuation) -> BTreeMap<&str, &PositionValuation> {
    valuation
        .positions
        .iter()
        .map(|p| (p.ticker.as_str(), p))
        .collect()
}
