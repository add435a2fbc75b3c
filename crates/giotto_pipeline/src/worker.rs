//! Stage workers: runners that drive every job of one stage.

use crate::BatchExecutor;
use crate::handlers::{JobHandler, StageContext, write_atomic};
use async_trait::async_trait;
use giotto_core::{Job, JobType, PipelineState, output_exists};
use giotto_error::{
    GenerationError, GenerationErrorKind, GiottoResult, StorageError, StorageErrorKind,
};
use giotto_interface::{RateLimit, RatePermit, Runner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Runs the runnable jobs of one stage through a [`JobHandler`].
///
/// For each pending or failed job the worker first looks for an existing
/// non-empty output and completes the job from it without calling the
/// handler. Otherwise it waits on the rate limiter, lets the handler write
/// the output and completes the job once the file is there. Failures are
/// recorded on the job and never stop its siblings; only run-fatal errors
/// (persistence, missing upstream assets) escape.
///
/// The stage flag is set once no job of the stage is left pending or failed.
pub struct StageWorker<H> {
    handler: Arc<H>,
    concurrency: usize,
    rate_limit: Option<Arc<dyn RateLimit>>,
    name: String,
}

impl<H: JobHandler> StageWorker<H> {
    /// Worker running one job at a time with no rate limiting.
    pub fn new(handler: H) -> Self {
        let name = format!("stage:{}", handler.job_type());
        Self {
            handler: Arc::new(handler),
            concurrency: 1,
            rate_limit: None,
            name,
        }
    }

    /// Run up to `concurrency` jobs at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Throttle handler calls through `limiter`.
    pub fn with_rate_limit(mut self, limiter: Arc<dyn RateLimit>) -> Self {
        self.rate_limit = Some(limiter);
        self
    }

    /// Stage this worker serves.
    pub fn job_type(&self) -> JobType {
        self.handler.job_type()
    }

    /// Configured concurrency.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

#[async_trait]
impl<H: JobHandler> Runner<PipelineState, PipelineState> for StageWorker<H> {
    #[instrument(skip_all, fields(run_id = %state.run_id(), job_type = %self.job_type()))]
    async fn run(&self, mut state: PipelineState) -> GiottoResult<PipelineState> {
        let job_type = self.job_type();
        if state.is_stage_complete(job_type) {
            debug!("Stage already complete");
            return Ok(state);
        }

        let runnable: Vec<Job> = state.runnable_jobs(job_type).cloned().collect();
        if runnable.is_empty() {
            state.mark_stage_complete(job_type);
            return Ok(state);
        }

        state.layout().ensure()?;
        info!(jobs = runnable.len(), concurrency = self.concurrency, "Running stage");

        let ctx = Arc::new(StageContext::from_state(&state));
        let items = runnable.into_iter().map(|j| (j.id().clone(), j)).collect();
        let batch = BatchExecutor::new(self.concurrency)
            .run(items, |job| {
                run_job(
                    Arc::clone(&self.handler),
                    self.rate_limit.clone(),
                    Arc::clone(&ctx),
                    job,
                )
            })
            .await;

        let mut fatal = None;
        for outcome in batch.into_outcomes() {
            let (id, result) = outcome.into_parts();
            match result {
                Ok(job) => state.replace_job(job)?,
                Err(e) if e.is_run_fatal() => {
                    warn!(job_id = %id, error = %e, "Run-fatal job failure");
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    warn!(job_id = %id, error = %e, "Job task aborted");
                    if let Some(job) = state.job_mut(&id) {
                        job.fail(e.to_string());
                    }
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }

        let done = state.mark_stage_complete(job_type);
        let progress = state.progress();
        info!(stage_complete = done, %progress, "Stage pass finished");
        Ok(state)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Drive one job to a terminal or failed status.
///
/// `Err` is returned only for run-fatal errors.
async fn run_job<H: JobHandler>(
    handler: Arc<H>,
    limiter: Option<Arc<dyn RateLimit>>,
    ctx: Arc<StageContext>,
    mut job: Job,
) -> GiottoResult<Job> {
    let output = ctx.layout().output_path(&job);
    if output_exists(&output) {
        debug!(job_id = %job.id(), "Output already present, skipping call");
        job.complete(path_ref(&output));
        return Ok(job);
    }

    job.start();
    match attempt(handler.as_ref(), limiter.as_deref(), &ctx, &job, &output).await {
        Ok(()) => {
            debug!(job_id = %job.id(), "Job completed");
            job.complete(path_ref(&output));
        }
        Err(e) if e.is_run_fatal() => return Err(e),
        Err(e) => {
            warn!(job_id = %job.id(), error = %e, "Job failed");
            job.fail(e.to_string());
        }
    }
    Ok(job)
}

async fn attempt<H: JobHandler>(
    handler: &H,
    limiter: Option<&dyn RateLimit>,
    ctx: &StageContext,
    job: &Job,
    output: &Path,
) -> GiottoResult<()> {
    let _permit = match limiter {
        Some(limiter) => limiter.acquire(handler.resource_key()).await?,
        None => RatePermit::unlimited(),
    };
    handler.handle(job, ctx, output).await?;
    if !output_exists(output) {
        return Err(GenerationError::new(GenerationErrorKind::EmptyOutput(format!(
            "{} wrote nothing to {}",
            job.id(),
            output.display()
        )))
        .into());
    }
    Ok(())
}

fn path_ref(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Handler that copies a fixed fixture file to every output.
struct FixtureHandler {
    job_type: JobType,
    fixture: PathBuf,
}

#[async_trait]
impl JobHandler for FixtureHandler {
    fn job_type(&self) -> JobType {
        self.job_type
    }

    fn resource_key(&self) -> &str {
        "replay"
    }

    async fn handle(&self, _job: &Job, _ctx: &StageContext, output: &Path) -> GiottoResult<()> {
        let bytes = tokio::fs::read(&self.fixture).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                self.fixture.display(),
                e
            )))
        })?;
        write_atomic(output, &bytes).await
    }
}

/// Stage runner that replays a fixture instead of calling a collaborator.
///
/// Every runnable job of the stage receives a copy of the same file. Used for
/// offline runs and tests; jobs go through the same lifecycle as with
/// [`StageWorker`].
pub struct ReplayStageWorker {
    inner: StageWorker<FixtureHandler>,
}

impl ReplayStageWorker {
    /// Replay `fixture` for every job of `job_type`.
    pub fn new(job_type: JobType, fixture: impl Into<PathBuf>) -> Self {
        let mut inner = StageWorker::new(FixtureHandler {
            job_type,
            fixture: fixture.into(),
        });
        inner.name = format!("replay:{}", job_type);
        Self { inner }
    }

    /// Copy up to `concurrency` fixtures at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.inner = self.inner.with_concurrency(concurrency);
        self
    }

    /// Stage this worker serves.
    pub fn job_type(&self) -> JobType {
        self.inner.job_type()
    }

    /// File copied to every output.
    pub fn fixture(&self) -> &Path {
        &self.inner.handler.fixture
    }
}

#[async_trait]
impl Runner<PipelineState, PipelineState> for ReplayStageWorker {
    async fn run(&self, state: PipelineState) -> GiottoResult<PipelineState> {
        self.inner.run(state).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
