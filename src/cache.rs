//! In-memory LRU cache for incoming translations.
//! Key: (direction, message key, blake3 hash of the source text), so an
//! edited message never serves a stale cached translation.
//! Capacity: 500 entries; the bound is the only eviction guarantee.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::Direction;

/// Default capacity of the result cache.
pub const DEFAULT_CAPACITY: usize = 500;

/// Composite cache key. The text hash is a stable blake3 digest, so keys
/// stay consistent across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    direction: Direction,
    message_key: String,
    text_hash: [u8; 32],
}

impl CacheKey {
    pub fn new(direction: Direction, message_key: &str, text: &str) -> Self {
        Self {
            direction,
            message_key: message_key.to_string(),
            text_hash: *blake3::hash(text.as_bytes()).as_bytes(),
        }
    }

    /// Key for an incoming display translation.
    pub fn incoming(message_key: &str, text: &str) -> Self {
        Self::new(Direction::Incoming, message_key, text)
    }
}

/// Thread-safe bounded translation cache.
pub struct TranslationCache {
    inner: Mutex<LruCache<CacheKey, String>>,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("cache capacity must be > 0"),
            )),
        }
    }

    /// Look up a cached translation.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    /// Insert a translation, evicting the least-recently-used entry when
    /// the capacity bound is reached.
    pub fn insert(&self, key: CacheKey, translated_text: String) {
        self.inner.lock().put(key, translated_text);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
