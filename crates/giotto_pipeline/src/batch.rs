//! Bounded-concurrency batch execution.

use derive_getters::Getters;
use giotto_error::{GiottoResult, PipelineError, PipelineErrorKind};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

/// Result of one task in a batch.
#[derive(Debug, Getters)]
pub struct BatchOutcome<K, R> {
    /// Position of the item in the submitted batch
    index: usize,
    /// Caller-supplied key
    key: K,
    /// What the task returned, or why it did not
    result: GiottoResult<R>,
}

impl<K, R> BatchOutcome<K, R> {
    /// Whether the task succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Split into key and result.
    pub fn into_parts(self) -> (K, GiottoResult<R>) {
        (self.key, self.result)
    }
}

/// Every outcome of a batch, in submission order.
#[derive(Debug)]
pub struct BatchResult<K, R> {
    outcomes: Vec<BatchOutcome<K, R>>,
}

impl<K, R> BatchResult<K, R> {
    /// All outcomes in submission order.
    pub fn outcomes(&self) -> &[BatchOutcome<K, R>] {
        &self.outcomes
    }

    /// Outcomes that failed, in submission order.
    pub fn failed(&self) -> Vec<&BatchOutcome<K, R>> {
        self.outcomes.iter().filter(|o| !o.is_ok()).collect()
    }

    /// Number of tasks in the batch.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether every task succeeded.
    pub fn is_all_ok(&self) -> bool {
        self.outcomes.iter().all(BatchOutcome::is_ok)
    }

    /// Consume the batch, yielding outcomes in submission order.
    pub fn into_outcomes(self) -> Vec<BatchOutcome<K, R>> {
        self.outcomes
    }
}

impl<K: Ord, R> BatchResult<K, R> {
    /// Successful results ordered by key, regardless of completion order.
    pub fn succeeded(&self) -> Vec<(&K, &R)> {
        let mut ok: Vec<(&K, &R)> = self
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (&o.key, r)))
            .collect();
        ok.sort_by(|a, b| a.0.cmp(b.0));
        ok
    }

    /// Owned form of [`BatchResult::succeeded`].
    pub fn into_succeeded(self) -> Vec<(K, R)> {
        let mut ok: Vec<(K, R)> = self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.ok().map(|r| (o.key, r)))
            .collect();
        ok.sort_by(|a, b| a.0.cmp(&b.0));
        ok
    }
}

/// Runs a batch of async tasks with at most `limit` in flight.
///
/// One task failing or panicking never affects its siblings; every task
/// yields its own [`BatchOutcome`].
///
/// # Example
///
/// ```
/// use giotto_pipeline::BatchExecutor;
///
/// # #[tokio::main]
/// # async fn main() {
/// let executor = BatchExecutor::new(2);
/// let items = vec![(3, 30), (1, 10), (2, 20)];
/// let result = executor.run(items, |n: u32| async move { Ok(n / 10) }).await;
///
/// assert!(result.is_all_ok());
/// let values: Vec<u32> = result.into_succeeded().into_iter().map(|(_, v)| v).collect();
/// assert_eq!(values, vec![1, 2, 3]);
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BatchExecutor {
    limit: usize,
}

impl BatchExecutor {
    /// Executor running at most `limit` tasks at once. A limit of zero is
    /// treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Executor running one task at a time.
    pub fn sequential() -> Self {
        Self::new(1)
    }

    /// Maximum number of tasks in flight.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `task` over every item.
    ///
    /// The permit for a task is released when the task finishes, whether it
    /// succeeded, failed or panicked.
    #[instrument(skip_all, fields(limit = self.limit, items = items.len()))]
    pub async fn run<K, T, R, F, Fut>(&self, items: Vec<(K, T)>, mut task: F) -> BatchResult<K, R>
    where
        K: Send,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = GiottoResult<R>> + Send + 'static,
        R: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut pending = Vec::with_capacity(items.len());

        for (key, item) in items {
            let fut = task(item);
            let semaphore = Arc::clone(&semaphore);
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    PipelineError::new(PipelineErrorKind::TaskPanicked {
                        index: 0,
                        message: e.to_string(),
                    })
                })?;
                fut.await
            });
            pending.push((key, handle));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (index, (key, handle)) in pending.into_iter().enumerate() {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(index, error = %e, "Batch task did not finish");
                    Err(PipelineError::new(PipelineErrorKind::TaskPanicked {
                        index,
                        message: e.to_string(),
                    })
                    .into())
                }
            };
            outcomes.push(BatchOutcome { index, key, result });
        }

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        debug!(total = outcomes.len(), failed, "Batch finished");
        BatchResult { outcomes }
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::sequential()
    }
}
