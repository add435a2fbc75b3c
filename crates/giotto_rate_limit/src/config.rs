//! Configuration structures for rate limiting and retry.
//!
//! Limits are keyed by resource (usually a provider name):
//!
//! ```toml
//! [rate_limits.images]
//! rpm = 10
//! max_concurrent = 2
//!
//! [retry]
//! initial_backoff_ms = 2000
//! max_backoff_ms = 60000
//! max_attempts = 5
//! ```

use derive_getters::Getters;
use giotto_error::{ConfigError, GiottoError, GiottoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, instrument};

/// Limits for one resource. `None` means unlimited.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_", strip_option)]
pub struct ResourceLimit {
    /// Requests per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rpm: Option<u32>,

    /// Maximum calls in flight at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_concurrent: Option<u32>,
}

/// Exponential backoff used when a collaborator reports a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct RetryPolicy {
    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    initial_backoff_ms: u64,

    /// Upper bound on any single delay
    #[serde(default = "default_max_backoff_ms")]
    max_backoff_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> usize {
    5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    /// Delays between attempts: doubling from the initial backoff, with
    /// jitter, never above `max_backoff_ms`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = Duration::from_millis(self.max_backoff_ms);
        // Retry n waits base^(n+1) * factor ms, so base 2 with half the
        // initial delay as the factor starts at the initial delay.
        ExponentialBackoff::from_millis(2)
            .factor((self.initial_backoff_ms / 2).max(1))
            .max_delay(max)
            .map(jitter)
            .map(move |delay| delay.min(max))
            .take(self.max_attempts)
    }
}

/// Rate limit and retry settings.
///
/// # Example
///
/// ```
/// use giotto_rate_limit::RateLimitConfig;
///
/// let config = RateLimitConfig::from_toml_str(r#"
///     [rate_limits.images]
///     rpm = 10
///     max_concurrent = 2
/// "#).unwrap();
///
/// assert_eq!(*config.rate_limits()["images"].rpm(), Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize, Getters)]
pub struct RateLimitConfig {
    /// Limits per resource key
    #[serde(default)]
    rate_limits: BTreeMap<String, ResourceLimit>,

    /// Backoff for transient collaborator failures
    #[serde(default)]
    retry: RetryPolicy,
}

impl RateLimitConfig {
    /// Build from already-parsed parts.
    pub fn new(rate_limits: BTreeMap<String, ResourceLimit>, retry: RetryPolicy) -> Self {
        Self { rate_limits, retry }
    }

    /// Limit for a resource, if one is configured.
    pub fn limit_for(&self, resource_key: &str) -> Option<&ResourceLimit> {
        self.rate_limits.get(resource_key)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> GiottoResult<Self> {
        debug!("Loading rate limit configuration from file");

        config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                GiottoError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                GiottoError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> GiottoResult<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                GiottoError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }
}
