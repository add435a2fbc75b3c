//! Rate limiting and retry for Giotto collaborators.
//!
//! - [`KeyedRateLimiter`] throttles calls per resource key (requests per
//!   minute via governor, calls in flight via a Tokio semaphore).
//! - [`execute_with_retry`] and [`RetryingProducer`] retry transient
//!   collaborator failures with jittered exponential backoff.
//! - [`RateLimitConfig`] holds both, loadable from TOML.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod limiter;
mod retry;

pub use config::{RateLimitConfig, ResourceLimit, RetryPolicy};
pub use limiter::KeyedRateLimiter;
pub use retry::{RetryingProducer, execute_with_retry};
