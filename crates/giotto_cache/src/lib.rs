//! Response caching with TTL and LRU eviction.
//!
//! Collaborator responses are cached by a hash of the provider name and
//! the request, so two jobs asking for the same prompt in one process pay
//! for it once. The cache is an explicit value handed to whoever needs it;
//! there is no process-wide registry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;

pub use cache::{CacheEntry, CacheKey, ResponseCache, ResponseCacheConfig, ResponseCacheConfigBuilder};
