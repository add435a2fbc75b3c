//! Keyed rate limiter using governor and Tokio semaphores.
//!
//! Each configured resource gets its own GCRA limiter for requests per
//! minute and its own semaphore for calls in flight. Resources without a
//! configured limit are not throttled.

use crate::{RateLimitConfig, ResourceLimit};
use async_trait::async_trait;
use giotto_error::{GenerationError, GenerationErrorKind, GiottoResult};
use giotto_interface::{RateLimit, RatePermit};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Semaphore;

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
struct ResourceLimiter {
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent_semaphore: Option<Arc<Semaphore>>,
}

impl ResourceLimiter {
    fn new(limit: &ResourceLimit) -> Self {
        let rpm_limiter = limit.rpm().and_then(|rpm| {
            NonZeroU32::new(rpm).map(|n| Arc::new(GovernorRateLimiter::direct(Quota::per_minute(n))))
        });
        let concurrent_semaphore = limit
            .max_concurrent()
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n as usize)));
        Self {
            rpm_limiter,
            concurrent_semaphore,
        }
    }
}

/// Rate limiter holding one quota per resource key.
///
/// # Example
///
/// ```
/// use giotto_interface::RateLimit;
/// use giotto_rate_limit::{KeyedRateLimiter, RateLimitConfig};
///
/// # #[tokio::main]
/// # async fn main() -> giotto_error::GiottoResult<()> {
/// let config = RateLimitConfig::from_toml_str("[rate_limits.images]\nmax_concurrent = 1")?;
/// let limiter = KeyedRateLimiter::new(&config);
///
/// let permit = limiter.acquire("images").await?;
/// assert_eq!(limiter.available("images"), Some(0));
/// drop(permit);
/// assert_eq!(limiter.available("images"), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct KeyedRateLimiter {
    limiters: HashMap<String, ResourceLimiter>,
}

impl KeyedRateLimiter {
    /// Build limiters for every configured resource.
    pub fn new(config: &RateLimitConfig) -> Self {
        let limiters = config
            .rate_limits()
            .iter()
            .map(|(key, limit)| (key.clone(), ResourceLimiter::new(limit)))
            .collect();
        Self { limiters }
    }

    /// Free concurrency slots for a resource, if it has a concurrency limit.
    pub fn available(&self, resource_key: &str) -> Option<usize> {
        self.limiters
            .get(resource_key)
            .and_then(|l| l.concurrent_semaphore.as_ref())
            .map(|s| s.available_permits())
    }

    /// Whether any limit is configured for a resource.
    pub fn is_limited(&self, resource_key: &str) -> bool {
        self.limiters.contains_key(resource_key)
    }
}

#[async_trait]
impl RateLimit for KeyedRateLimiter {
    #[tracing::instrument(skip(self))]
    async fn acquire(&self, resource_key: &str) -> GiottoResult<RatePermit> {
        let Some(limiter) = self.limiters.get(resource_key) else {
            return Ok(RatePermit::unlimited());
        };

        if let Some(rpm) = &limiter.rpm_limiter {
            rpm.until_ready().await;
        }

        // Concurrency slot last, so it is not held while waiting on the quota
        match &limiter.concurrent_semaphore {
            Some(semaphore) => {
                let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                    GenerationError::new(GenerationErrorKind::RateLimited(format!(
                        "{}: {}",
                        resource_key, e
                    )))
                })?;
                tracing::trace!("Acquired concurrency slot");
                Ok(RatePermit::from(permit))
            }
            None => Ok(RatePermit::unlimited()),
        }
    }
}
