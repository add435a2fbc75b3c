//! Response cache implementation.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cache entry with value and expiration.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Check if this entry is expired.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// SHA-256 of a provider name and its request parts.
///
/// Parts are length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
///
/// ```
/// use giotto_cache::CacheKey;
///
/// let a = CacheKey::new("replay", &["a lighthouse", ""]);
/// let b = CacheKey::new("replay", &["a lighthouse", ""]);
/// assert_eq!(a, b);
/// assert_ne!(a, CacheKey::new("imagen", &["a lighthouse", ""]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash a provider name and request parts.
    pub fn new(provider: &str, parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in std::iter::once(provider).chain(parts.iter().copied()) {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Configuration for the response cache.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
pub struct ResponseCacheConfig {
    /// Default TTL for cached entries (seconds)
    #[serde(default = "default_ttl")]
    #[builder(default = default_ttl())]
    ttl_secs: u64,

    /// Maximum cache size (number of entries)
    #[serde(default = "default_max_size")]
    #[builder(default = default_max_size())]
    max_size: usize,

    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    #[builder(default = default_enabled())]
    enabled: bool,
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_size() -> usize {
    256
}

fn default_enabled() -> bool {
    true
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            max_size: default_max_size(),
            enabled: default_enabled(),
        }
    }
}

struct Inner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    access_order: Vec<CacheKey>,
    hits: u64,
    misses: u64,
}

/// Cache for collaborator responses.
///
/// Shared by reference across concurrent jobs; values are cloned out.
///
/// # Example
///
/// ```
/// use giotto_cache::{CacheKey, ResponseCache, ResponseCacheConfig};
///
/// let cache: ResponseCache<Vec<u8>> = ResponseCache::new(ResponseCacheConfig::default());
/// let key = CacheKey::new("replay", &["a lighthouse at dusk"]);
///
/// cache.insert(key.clone(), vec![1, 2, 3]);
/// assert_eq!(cache.get(&key), Some(vec![1, 2, 3]));
/// assert_eq!(cache.hits(), 1);
/// ```
pub struct ResponseCache<V> {
    config: ResponseCacheConfig,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a new response cache with configuration.
    pub fn new(config: ResponseCacheConfig) -> Self {
        tracing::debug!(
            ttl_secs = config.ttl_secs,
            max_size = config.max_size,
            enabled = config.enabled,
            "Creating new ResponseCache"
        );
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                access_order: Vec::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> &ResponseCacheConfig {
        &self.config
    }

    // A poisoned lock only means another job panicked mid-update; the map
    // itself is still consistent enough to serve or drop entries.
    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a response with the default TTL.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.insert_with_ttl(key, value, Duration::from_secs(self.config.ttl_secs));
    }

    /// Insert a response with an explicit TTL.
    #[tracing::instrument(skip(self, value), fields(key = %&key.as_str()[..12], ttl = ?ttl))]
    pub fn insert_with_ttl(&self, key: CacheKey, value: V, ttl: Duration) {
        if !self.config.enabled {
            tracing::debug!("Cache disabled, skipping insert");
            return;
        }

        let mut inner = self.lock();

        // Evict if at capacity
        if inner.entries.len() >= self.config.max_size && !inner.entries.contains_key(&key) {
            Self::evict_lru(&mut inner);
        }

        if let Some(pos) = inner.access_order.iter().position(|k| k == &key) {
            inner.access_order.remove(pos);
        }
        inner.access_order.push(key.clone());

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
        tracing::debug!(cache_size = inner.entries.len(), "Inserted entry into cache");
    }

    /// Get a cached response.
    ///
    /// Returns None if:
    /// - Entry doesn't exist
    /// - Entry is expired
    /// - Cache is disabled
    #[tracing::instrument(skip(self), fields(key = %&key.as_str()[..12]))]
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            tracing::debug!("Cache entry expired, removing");
            inner.entries.remove(key);
            if let Some(pos) = inner.access_order.iter().position(|k| k == key) {
                inner.access_order.remove(pos);
            }
            inner.misses += 1;
            return None;
        }

        if let Some(pos) = inner.access_order.iter().position(|k| k == key) {
            let k = inner.access_order.remove(pos);
            inner.access_order.push(k);
        }
        inner.hits += 1;

        let value = inner.entries.get(key).map(|e| e.value.clone());
        tracing::debug!("Cache hit");
        value
    }

    /// Remove expired entries from cache.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();

        inner.entries.retain(|_, entry| !entry.is_expired());
        let Inner {
            entries,
            access_order,
            ..
        } = &mut *inner;
        access_order.retain(|k| entries.contains_key(k));

        let removed = before - inner.entries.len();
        if removed > 0 {
            tracing::info!(removed, remaining = inner.entries.len(), "Cleaned up expired cache entries");
        }
        removed
    }

    /// Clear all cache entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.access_order.clear();
        tracing::info!(cleared = count, "Cleared cache");
    }

    /// Get number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.lock().hits
    }

    /// Lookups that fell through to the collaborator.
    pub fn misses(&self) -> u64 {
        self.lock().misses
    }

    fn evict_lru(inner: &mut Inner<V>) {
        if !inner.access_order.is_empty() {
            let key = inner.access_order.remove(0);
            tracing::debug!(key = %&key.as_str()[..12], "Evicting LRU entry");
            inner.entries.remove(&key);
        }
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(ResponseCacheConfig::default())
    }
}
