//! SharedLruCache: lock-guarded LRU cache for use across threads

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::error::Result;
use crate::lru::LruCache;
use crate::stats::CacheStats;

/// Thread-safe handle combining an [`LruCache`] with hit/miss statistics
///
/// A lookup reorders the recency list, so reads and writes take the same
/// exclusive lock. Values leave the lock by clone ([`get`](Self::get)) or
/// through a closure ([`get_with`](Self::get_with)), never as a borrow.
/// Cloning the handle shares the underlying cache.
pub struct SharedLruCache<K, V> {
    /// Guarded cache
    cache: Arc<Mutex<LruCache<K, V>>>,

    /// Cache statistics
    stats: Arc<CacheStats>,

    /// Cache capacity
    capacity: usize,
}

impl<K, V> Clone for SharedLruCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            stats: Arc::clone(&self.stats),
            capacity: self.capacity,
        }
    }
}

impl<K, V> SharedLruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new shared cache with the given capacity
    ///
    /// # Errors
    /// Returns [`Error::InvalidCapacity`](crate::Error::InvalidCapacity)
    /// when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        let cache = LruCache::new(capacity)?;

        Ok(Self {
            cache: Arc::new(Mutex::new(cache)),
            stats: Arc::new(CacheStats::new()),
            capacity,
        })
    }

    /// Get a copy of a value, marking it most recently used
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Run `f` on a value while the lock is held, marking it most recently used
    pub fn get_with<Q, R, F>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(value) => {
                self.stats.record_hit();
                Some(f(value))
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Insert a key-value pair, returning the entry evicted to make room
    pub fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let evicted = self.cache.lock().insert(key, value);
        self.stats.record_insert();
        if evicted.is_some() {
            self.stats.record_eviction();
        }
        evicted
    }

    /// Remove a key from the cache
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.lock().remove(key)
    }

    /// Check whether a key is cached without touching its recency
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.lock().contains_key(key)
    }
}

impl<K, V> SharedLruCache<K, V> {
    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get current cache size
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the cache and reset statistics
    pub fn clear(&self) {
        self.cache.lock().clear();
        self.stats.reset();
    }
}
