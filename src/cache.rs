//! Embedding cache with least-recently-used eviction.
//!
//! Provider calls are the slow part of semantic chunking, and documents
//! re-chunked after small edits share most of their segments. The cache
//! memoizes vectors by content:
//!
//! ```text
//! key   = sha256(whitespace-normalized text)
//! value = embedding vector
//! ```
//!
//! Recency is tracked by [`lru::LruCache`]. A hit promotes the entry, and
//! inserting a new key into a full cache evicts the least recently used one:
//!
//! ```text
//! capacity 2
//! put A        [A]
//! put B        [B, A]
//! get A        [A, B]      <- A promoted
//! put C        [C, A]      <- B evicted
//! ```
//!
//! The cache is a plain value with `&mut self` methods. Sharing it between
//! concurrent chunking calls requires a lock around it (the dispatcher keeps
//! it in a `Mutex` and never holds the lock across an await).

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content hash used as a cache key.
pub type CacheKey = [u8; 32];

/// Derive the cache key for `text`.
///
/// Runs of whitespace collapse to one space and the ends are trimmed, so
/// re-flowed text hits the same entry.
#[must_use]
pub fn cache_key(text: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    for (i, word) in text.split_whitespace().enumerate() {
        if i > 0 {
            hasher.update(b" ");
        }
        hasher.update(word.as_bytes());
    }
    hasher.finalize().into()
}

/// Snapshot of cache size and hit counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently held.
    pub size: usize,
    /// Maximum entries before eviction.
    pub capacity: usize,
    /// Lookups that found a vector.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before the first lookup.
    pub hit_rate: f64,
}

/// Capacity-bounded LRU map from text to embedding.
///
/// ## Example
///
/// ```rust
/// use tessera::EmbeddingCache;
///
/// let mut cache = EmbeddingCache::new(2);
/// cache.put("alpha", vec![1.0, 0.0]);
/// cache.put("beta", vec![0.0, 1.0]);
///
/// assert_eq!(cache.get("alpha"), Some(vec![1.0, 0.0])); // promotes alpha
/// cache.put("gamma", vec![0.5, 0.5]);                     // evicts beta
///
/// assert!(cache.contains("alpha"));
/// assert!(!cache.contains("beta"));
/// assert_eq!(cache.stats().hits, 1);
/// ```
#[derive(Debug)]
pub struct EmbeddingCache {
    // `None` when the capacity is zero: nothing is ever stored.
    entries: Option<LruCache<CacheKey, Vec<f32>>>,
    hits: u64,
    misses: u64,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` vectors. A zero capacity
    /// stores nothing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.cap().get())
    }

    /// Entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `text`, promoting it to most recently used on a hit.
    pub fn get(&mut self, text: &str) -> Option<Vec<f32>> {
        let key = cache_key(text);
        let found = self
            .entries
            .as_mut()
            .and_then(|entries| entries.get(&key).cloned());
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    /// Whether `text` is cached. Does not count as an access.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.contains(&cache_key(text)))
    }

    /// Store `vector` for `text` as the most recently used entry.
    ///
    /// Inserting a new key into a full cache first evicts the least recently
    /// used entry. Re-inserting an existing key replaces its vector.
    pub fn put(&mut self, text: &str, vector: Vec<f32>) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(cache_key(text), vector);
        }
    }

    /// Current size and counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            size: self.len(),
            capacity: self.capacity(),
            hits: self.hits,
            misses: self.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
        self.hits = 0;
        self.misses = 0;
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(1000)
    }
}
