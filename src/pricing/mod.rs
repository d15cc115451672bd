// Pricing module - pluggable quote sources and a TTL cache in front of them

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::{LedgerResult, PortfolioError};
use crate::money::Money;

/// Default quote freshness window
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 20;

/// External current-price lookup.
///
/// Any failure (network, no quote, malformed data) must surface as
/// `PortfolioError::PriceUnavailable`, never as a zero price.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self, ticker: &str) -> LedgerResult<Money>;
}

#[async_trait]
impl<S: PriceSource + ?Sized> PriceSource for Arc<S> {
    async fn get_price(&self, ticker: &str) -> LedgerResult<Money> {
        (**self).get_price(ticker).await
    }
}

/// Fixed set of quotes, e.g. loaded from the `stocks` table
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    prices: HashMap<String, Money>,
}

impl StaticPriceSource {
    pub fn new(prices: HashMap<String, Money>) -> Self {
        Self { prices }
    }

    /// Snapshot of every persisted current price
    pub fn from_db(conn: &rusqlite::Connection) -> anyhow::Result<Self> {
        Ok(Self::new(crate::db::get_current_prices(conn)?))
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn get_price(&self, ticker: &str) -> LedgerResult<Money> {
        match self.prices.get(ticker) {
            Some(price) if *price > Decimal::ZERO => Ok(*price),
            Some(price) => Err(PortfolioError::PriceUnavailable {
                ticker: ticker.to_string(),
                reason: format!("stored quote {} is not positive", price),
            }),
            None => Err(PortfolioError::PriceUnavailable {
                ticker: ticker.to_string(),
                reason: "no quote recorded".to_string(),
            }),
        }
    }
}

/// Price cache entry
#[derive(Debug, Clone)]
struct CacheEntry {
    price: Money,
    timestamp: DateTime<Utc>,
}

/// Price source decorator with TTL caching of successful quotes
pub struct CachedPriceSource<S> {
    inner: S,
    cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
    cache_ttl: Duration,
}

impl<S: PriceSource> CachedPriceSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl_minutes(inner, DEFAULT_CACHE_TTL_MINUTES)
    }

    pub fn with_ttl_minutes(inner: S, minutes: i64) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_ttl: Duration::minutes(minutes),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clear cache
    pub fn clear_cache(&self) {
        self.guard().clear();
        info!("Price cache cleared");
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.guard().len()
    }
}

#[async_trait]
impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    async fn get_price(&self, ticker: &str) -> LedgerResult<Money> {
        // Check cache first
        {
            let cache = self.guard();
            if let Some(entry) = cache.get(ticker) {
                let age = Utc::now().signed_duration_since(entry.timestamp);
                if age < self.cache_ttl {
                    debug!(
                        "Using cached price for {} (age: {}m)",
                        ticker,
                        age.num_minutes()
                    );
                    return Ok(entry.price);
                }
            }
        }

        match self.inner.get_price(ticker).await {
            Ok(price) => {
                self.guard().insert(
                    ticker.to_string(),
                    CacheEntry {
                        price,
                        timestamp: Utc::now(),
                    },
                );
                Ok(price)
            }
            Err(e) => {
                // Failures are not cached; the next call retries
                warn!("Price lookup failed for {}: {}", ticker, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        price: Option<Money>,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn get_price(&self, ticker: &str) -> LedgerResult<Money> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.price.ok_or_else(|| PortfolioError::PriceUnavailable {
                ticker: ticker.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_static_source_missing_ticker_is_unavailable() {
        let source = StaticPriceSource::new(HashMap::from([("AAPL".to_string(), dec!(190))]));
        assert_eq!(source.get_price("AAPL").await.unwrap(), dec!(190));
        assert!(matches!(
            source.get_price("MSFT").await,
            Err(PortfolioError::PriceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_static_source_never_returns_zero() {
        let source = StaticPriceSource::new(HashMap::from([("AAPL".to_string(), Decimal::ZERO)]));
        assert!(source.get_price("AAPL").await.is_err());
    }

    #[tokio::test]
    async fn test_cached_source_hits_inner_once() {
        let cached = CachedPriceSource::new(CountingSource {
            calls: AtomicUsize::new(0),
            price: Some(dec!(12.5)),
        });

        assert_eq!(cached.get_price("AAPL").await.unwrap(), dec!(12.5));
        assert_eq!(cached.get_price("AAPL").await.unwrap(), dec!(12.5));
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cache_size(), 1);

        cached.clear_cache();
        assert_eq!(cached.cache_size(), 0);
    }

    #[tokio::test]
    async fn test_cached_source_does_not_cache_failures() {
        let cached = CachedPriceSource::new(CountingSource {
            calls: AtomicUsize::new(0),
            price: None,
        });

        assert!(cached.get_price("AAPL").await.is_err());
        assert!(cached.get_price("AAPL").await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cache_size(), 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let cached = CachedPriceSource::with_ttl_minutes(
            CountingSource {
                calls: AtomicUsize::new(0),
                price: Some(dec!(1)),
            },
            0,
        );
        cached.get_price("AAPL").await.unwrap();
        cached.get_price("AAPL").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
