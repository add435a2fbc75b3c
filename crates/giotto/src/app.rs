//! Orchestrator assembly from a [`GiottoConfig`].

use crate::GiottoConfig;
use giotto_cache::ResponseCache;
use giotto_core::JobType;
use giotto_database::SqliteStore;
use giotto_error::GiottoResult;
use giotto_interface::{MediaProvider, RateLimit, RawMedia, StoryProducer};
use giotto_pipeline::{
    AssemblyHandler, ChapterHandler, MediaHandler, Orchestrator, OutlineFileProducer,
    ReplayStageWorker, StageWorker,
};
use giotto_rate_limit::{KeyedRateLimiter, RetryingProducer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Orchestrator over the SQLite store.
pub type GiottoOrchestrator<P> = Orchestrator<SqliteStore, P>;

/// Fixture file names looked up in a fixtures directory.
pub const PORTRAIT_FIXTURE: &str = "portrait.png";
/// Panel fixture.
pub const PANEL_FIXTURE: &str = "panel.png";
/// Clip fixture.
pub const CLIP_FIXTURE: &str = "clip.mp4";

/// Load an outline file as the story producer, wrapped in the configured
/// retry policy.
pub fn outline_producer(
    config: &GiottoConfig,
    outline: impl AsRef<Path>,
    drafts_dir: Option<PathBuf>,
) -> GiottoResult<RetryingProducer<OutlineFileProducer>> {
    let mut producer = OutlineFileProducer::from_file(outline)?;
    if let Some(dir) = drafts_dir {
        producer = producer.with_drafts_dir(dir);
    }
    Ok(RetryingProducer::new(producer, *config.retry()))
}

/// Open the configured store; parent directories are created as needed.
pub fn open_store(config: &GiottoConfig) -> GiottoResult<Arc<SqliteStore>> {
    let path = config.database_path();
    debug!(path = %path.display(), "Opening run store");
    let store = SqliteStore::open_with(path, config.connection_options())?;
    Ok(Arc::new(store))
}

/// Store, plot stage and post-production stage; media stages are left to the caller.
fn base<P>(
    config: &GiottoConfig,
    store: Arc<SqliteStore>,
    producer: Arc<P>,
    limiter: Arc<dyn RateLimit>,
) -> GiottoOrchestrator<P>
where
    P: StoryProducer + 'static,
{
    let concurrency = config.concurrency();
    Orchestrator::new(store, Arc::clone(&producer), config.orchestrator_config())
        .with_stage(
            JobType::Plot,
            StageWorker::new(ChapterHandler::new(producer))
                .with_concurrency(concurrency.for_stage(JobType::Plot))
                .with_rate_limit(limiter),
        )
        .with_stage(
            JobType::PostProduction,
            StageWorker::new(AssemblyHandler::new())
                .with_concurrency(concurrency.for_stage(JobType::PostProduction)),
        )
}

/// Orchestrator whose media stages call `media`, sharing one response cache
/// and one rate limiter.
#[instrument(skip_all)]
pub fn build_orchestrator<P, M>(
    config: &GiottoConfig,
    store: Arc<SqliteStore>,
    producer: Arc<P>,
    media: Arc<M>,
) -> GiottoOrchestrator<P>
where
    P: StoryProducer + 'static,
    M: MediaProvider + 'static,
{
    let limiter: Arc<dyn RateLimit> = Arc::new(KeyedRateLimiter::new(&config.rate_limit_config()));
    let cache = Arc::new(ResponseCache::<RawMedia>::new(config.cache().clone()));
    let concurrency = config.concurrency();

    let mut orchestrator = base(config, store, producer, Arc::clone(&limiter));
    for job_type in [JobType::Character, JobType::Image, JobType::Video] {
        let worker = StageWorker::new(
            MediaHandler::new(Arc::clone(&media), job_type).with_cache(Arc::clone(&cache)),
        )
        .with_concurrency(concurrency.for_stage(job_type))
        .with_rate_limit(Arc::clone(&limiter));
        orchestrator = orchestrator.with_stage(job_type, worker);
    }
    info!(provider = media.provider_name(), "Orchestrator ready");
    orchestrator
}

/// Orchestrator whose media stages copy fixture files from `fixtures_dir`.
///
/// Expects `portrait.png`, `panel.png` and `clip.mp4`. A missing fixture
/// fails the jobs that need it rather than the build.
#[instrument(skip_all, fields(fixtures = %fixtures_dir.as_ref().display()))]
pub fn build_replay_orchestrator<P>(
    config: &GiottoConfig,
    store: Arc<SqliteStore>,
    producer: Arc<P>,
    fixtures_dir: impl AsRef<Path>,
) -> GiottoOrchestrator<P>
where
    P: StoryProducer + 'static,
{
    let limiter: Arc<dyn RateLimit> = Arc::new(KeyedRateLimiter::new(&config.rate_limit_config()));
    let fixtures = fixtures_dir.as_ref();
    let concurrency = config.concurrency();

    let mut orchestrator = base(config, store, producer, limiter);
    for (job_type, fixture) in [
        (JobType::Character, PORTRAIT_FIXTURE),
        (JobType::Image, PANEL_FIXTURE),
        (JobType::Video, CLIP_FIXTURE),
    ] {
        let worker = ReplayStageWorker::new(job_type, fixtures.join(fixture))
            .with_concurrency(concurrency.for_stage(job_type));
        orchestrator = orchestrator.with_stage(job_type, worker);
    }
    info!("Replay orchestrator ready");
    orchestrator
}
