//! Retry with exponential backoff for transient collaborator failures.

use crate::RetryPolicy;
use async_trait::async_trait;
use giotto_core::{ChapterDraft, ChapterOutline, Story, StoryInputs};
use giotto_error::{GiottoResult, RetryableError};
use giotto_interface::StoryProducer;
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

/// Run `operation` until it succeeds, fails permanently, or the policy runs
/// out of attempts.
///
/// Errors that report themselves retryable (timeouts, throttling, 5xx) are
/// retried after the next backoff delay; anything else returns immediately.
///
/// # Example
///
/// ```
/// use giotto_error::{GenerationError, GenerationErrorKind, GiottoError};
/// use giotto_rate_limit::{RetryPolicy, execute_with_retry};
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// # #[tokio::main]
/// # async fn main() {
/// let calls = AtomicU32::new(0);
/// let policy = RetryPolicy::default().with_initial_backoff_ms(1).with_max_attempts(3);
///
/// let result: Result<u32, GiottoError> = execute_with_retry(&policy, "flaky", || async {
///     if calls.fetch_add(1, Ordering::SeqCst) == 0 {
///         Err(GenerationError::new(GenerationErrorKind::Timeout("slow".into())).into())
///     } else {
///         Ok(7)
///     }
/// })
/// .await;
///
/// assert_eq!(result.unwrap(), 7);
/// assert_eq!(calls.load(Ordering::SeqCst), 2);
/// # }
/// ```
pub async fn execute_with_retry<F, Fut, R, E>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<R, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
    E: RetryableError + std::fmt::Display,
{
    Retry::spawn(policy.delays(), || {
        let attempt = operation();
        async move {
            match attempt.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(operation = label, "Transient error, will retry: {}", e);
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => {
                    warn!(operation = label, "Permanent error, failing immediately: {}", e);
                    Err(RetryError::Permanent(e))
                }
            }
        }
    })
    .await
}

/// Story producer that retries transient failures of the wrapped producer.
///
/// This is the collaborator's own retry budget, spent inside one job
/// attempt. It is independent of the per-job `retry_count`.
pub struct RetryingProducer<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: StoryProducer> RetryingProducer<P> {
    /// Wrap a producer with a retry policy.
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped producer.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: StoryProducer> StoryProducer for RetryingProducer<P> {
    #[tracing::instrument(skip_all, fields(producer = self.inner.producer_name()))]
    async fn outline(&self, inputs: &StoryInputs) -> GiottoResult<Story> {
        execute_with_retry(&self.policy, "outline", || self.inner.outline(inputs)).await
    }

    #[tracing::instrument(skip_all, fields(producer = self.inner.producer_name(), chapter = chapter.number()))]
    async fn write_chapter(
        &self,
        story: &Story,
        chapter: &ChapterOutline,
    ) -> GiottoResult<ChapterDraft> {
        execute_with_retry(&self.policy, "write_chapter", || {
            self.inner.write_chapter(story, chapter)
        })
        .await
    }

    fn producer_name(&self) -> &str {
        self.inner.producer_name()
    }
}
