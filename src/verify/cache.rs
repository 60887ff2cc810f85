//! LRU cache for verified receipts.
//!
//! Keyed by request [`Fingerprint`], so a receipt that was already verified
//! is served without another call to the service.

use crate::receipt::Receipt;
use crate::request::Fingerprint;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Default cache capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// LRU cache for verified receipts.
///
/// Only valid receipts are stored. When full, the least recently inserted or
/// read entry is evicted. The map and the counters share one lock, so
/// [`ReceiptCache::clear`] resets both together.
#[derive(Clone)]
pub struct ReceiptCache {
    inner: Arc<Mutex<CacheInner>>,
}

struct CacheInner {
    entries: LruCache<Fingerprint, Receipt>,
    hits: u64,
    misses: u64,
    additions: u64,
    evictions: u64,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries added.
    pub additions: u64,
    /// Number of entries evicted for capacity.
    pub evictions: u64,
    /// Current number of entries.
    pub size: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl ReceiptCache {
    /// Create a new cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity (at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: LruCache::new(cap),
                hits: 0,
                misses: 0,
                additions: 0,
                evictions: 0,
            })),
        }
    }

    /// Look up a receipt, counting a hit or a miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Receipt> {
        let mut inner = self.inner.lock();
        let found = inner.entries.get(fingerprint).cloned();
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// Store a verified receipt.
    ///
    /// Returns `false` without storing anything if the receipt is not valid.
    pub fn put(&self, fingerprint: Fingerprint, receipt: Receipt) -> bool {
        if !receipt.is_valid() {
            debug!("Refusing to cache unverified receipt {fingerprint}");
            return false;
        }

        let mut inner = self.inner.lock();
        if let Some((evicted, _)) = inner.entries.push(fingerprint, receipt) {
            if evicted != fingerprint {
                inner.evictions += 1;
                debug!("Evicted receipt {evicted} from cache");
            }
        }
        inner.additions += 1;
        true
    }

    /// Check for an entry without touching recency or counters.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.lock().entries.contains(fingerprint)
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            additions: inner.additions,
            evictions: inner.evictions,
            size: inner.entries.len(),
        }
    }

    /// Get the current number of entries in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().entries.cap().get()
    }

    /// Remove all entries and reset the statistics.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        inner.additions = 0;
        inner.evictions = 0;
    }
}

impl Default for ReceiptCache {
    fn default() -> Self {
        Self::new()
    }
}
