//! Content-addressed caching for holdings.
//!
//! The cache key is derived from the exact transaction set (blake3 over
//! every record in ledger order), so any insert, update or delete yields a
//! new key. There is no time-based expiry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{calculate_holdings, Holdings};
use crate::error::LedgerResult;
use crate::ledger::{order_records, TransactionRecord};

/// blake3 digest of a transaction set
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(records: &[TransactionRecord]) -> Self {
        let mut ordered = records.to_vec();
        order_records(&mut ordered);

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(ordered.len() as u64).to_le_bytes());
        if let Some(latest) = ordered.iter().map(|r| r.effective_date).max() {
            hasher.update(latest.to_string().as_bytes());
        }
        for r in &ordered {
            hasher.update(&r.sequence.to_le_bytes());
            hasher.update(r.ticker.as_bytes());
            hasher.update(r.direction.as_str().as_bytes());
            // normalize() so 10 and 10.00 hash the same
            hasher.update(r.quantity.normalize().to_string().as_bytes());
            hasher.update(b"@");
            hasher.update(r.price.normalize().to_string().as_bytes());
            hasher.update(r.effective_date.to_string().as_bytes());
            hasher.update(b";");
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub portfolio_id: i64,
    pub fingerprint: Fingerprint,
}

/// Storage strategy for computed holdings
pub trait HoldingsCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<Holdings>>;
    fn put(&self, key: CacheKey, holdings: Arc<Holdings>);
    /// Drop every entry belonging to a portfolio
    fn invalidate_portfolio(&self, portfolio_id: i64);
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct InMemoryHoldingsCache {
    entries: Mutex<HashMap<CacheKey, Arc<Holdings>>>,
}

impl InMemoryHoldingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<Holdings>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl HoldingsCache for InMemoryHoldingsCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<Holdings>> {
        self.guard().get(key).cloned()
    }

    fn put(&self, key: CacheKey, holdings: Arc<Holdings>) {
        self.guard().insert(key, holdings);
    }

    fn invalidate_portfolio(&self, portfolio_id: i64) {
        self.guard().retain(|k, _| k.portfolio_id != portfolio_id);
    }
}

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHoldingsCache;

impl HoldingsCache for NoHoldingsCache {
    fn get(&self, _key: &CacheKey) -> Option<Arc<Holdings>> {
        None
    }

    fn put(&self, _key: CacheKey, _holdings: Arc<Holdings>) {}

    fn invalidate_portfolio(&self, _portfolio_id: i64) {}
}

/// Wraps [`calculate_holdings`] with a cache lookup.
pub struct CachedHoldings<C: HoldingsCache> {
    cache: C,
}

impl<C: HoldingsCache> CachedHoldings<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn holdings(
        &self,
        portfolio_id: i64,
        records: &[TransactionRecord],
    ) -> LedgerResult<Arc<Holdings>> {
        let key = CacheKey {
            portfolio_id,
            fingerprint: Fingerprint::of(records),
        };
        if let Some(hit) = self.cache.get(&key) {
            debug!(portfolio_id, fingerprint = ?key.fingerprint, "holdings cache hit");
            return Ok(hit);
        }

        let holdings = Arc::new(calculate_holdings(records)?);
        self.cache.put(key, Arc::clone(&holdings));
        Ok(holdings)
    }

    pub fn invalidate(&self, portfolio_id: i64) {
        debug!(portfolio_id, "invalidating cached holdings");
        self.cache.invalidate_portfolio(portfolio_id);
    }
}
