//! Runner composition.
//!
//! A [`Pipeline`] chains [`Runner`]s so the output of one is the input of the
//! next. It is itself a runner, so pipelines nest. Composition adds no
//! retry or persistence behavior of its own.

use async_trait::async_trait;
use giotto_error::GiottoResult;
use giotto_interface::Runner;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A chain of runners from `In` to `Out`.
///
/// # Example
///
/// ```
/// use giotto_pipeline::{FnRunner, Pipeline};
///
/// # #[tokio::main]
/// # async fn main() -> giotto_error::GiottoResult<()> {
/// let pipeline = Pipeline::new(FnRunner::new("double", |x: u32| async move { Ok(x * 2) }))
///     .then(FnRunner::new("describe", |x: u32| async move { Ok(format!("got {}", x)) }));
///
/// assert_eq!(pipeline.execute(21).await?, "got 42");
/// assert_eq!(pipeline.describe(), "double -> describe");
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<In, Out> {
    runner: Arc<dyn Runner<In, Out>>,
    names: Vec<String>,
}

impl<In, Out> Clone for Pipeline<In, Out> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            names: self.names.clone(),
        }
    }
}

impl<In, Out> Pipeline<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Start a pipeline with a single runner.
    pub fn new<R>(runner: R) -> Self
    where
        R: Runner<In, Out> + 'static,
    {
        let names = vec![runner.name().to_string()];
        Self {
            runner: Arc::new(runner),
            names,
        }
    }

    /// Append a runner consuming this pipeline's output.
    pub fn then<Next, R>(self, next: R) -> Pipeline<In, Next>
    where
        Next: Send + 'static,
        R: Runner<Out, Next> + 'static,
    {
        let mut names = self.names;
        names.push(next.name().to_string());
        Pipeline {
            runner: Arc::new(Then {
                first: self.runner,
                second: Arc::new(next),
            }),
            names,
        }
    }

    /// Run every step in order, stopping at the first error.
    pub async fn execute(&self, input: In) -> GiottoResult<Out> {
        self.runner.run(input).await
    }

    /// Step names joined with arrows.
    pub fn describe(&self) -> String {
        self.names.join(" -> ")
    }
}

#[async_trait]
impl<In, Out> Runner<In, Out> for Pipeline<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    async fn run(&self, input: In) -> GiottoResult<Out> {
        self.execute(input).await
    }

    fn name(&self) -> &str {
        "pipeline"
    }
}

struct Then<A, B, C> {
    first: Arc<dyn Runner<A, B>>,
    second: Arc<dyn Runner<B, C>>,
}

#[async_trait]
impl<A, B, C> Runner<A, C> for Then<A, B, C>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
{
    async fn run(&self, input: A) -> GiottoResult<C> {
        let mid = self.first.run(input).await?;
        self.second.run(mid).await
    }
}

/// Adapts an async closure into a [`Runner`].
pub struct FnRunner<F, In, Out> {
    name: String,
    f: F,
    _marker: PhantomData<fn(In) -> Out>,
}

impl<F, Fut, In, Out> FnRunner<F, In, Out>
where
    F: Fn(In) -> Fut + Send + Sync,
    Fut: Future<Output = GiottoResult<Out>> + Send,
{
    /// Wrap a closure under a name used in logs.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, In, Out> Runner<In, Out> for FnRunner<F, In, Out>
where
    F: Fn(In) -> Fut + Send + Sync,
    Fut: Future<Output = GiottoResult<Out>> + Send,
    In: Send + 'static,
    Out: Send + 'static,
{
    async fn run(&self, input: In) -> GiottoResult<Out> {
        (self.f)(input).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giotto_error::{PipelineError, PipelineErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn pipelines_nest() {
        let inner = Pipeline::new(FnRunner::new("inc", |x: i32| async move { Ok(x + 1) }))
            .then(FnRunner::new("inc", |x: i32| async move { Ok(x + 1) }));
        let outer = Pipeline::new(inner).then(FnRunner::new("neg", |x: i32| async move { Ok(-x) }));
        assert_eq!(outer.execute(1).await.unwrap(), -3);
    }

    #[tokio::test]
    async fn first_error_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pipeline = Pipeline::new(FnRunner::new("fail", |_: ()| async {
            Err::<(), _>(PipelineError::new(PipelineErrorKind::RunNotFound("r1".into())).into())
        }))
        .then(FnRunner::new("count", move |_: ()| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        assert!(pipeline.execute(()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
