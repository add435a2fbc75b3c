//! Run-level control: story production, stage sequencing, halts and resume.

use crate::{CheckpointRunner, ExpandRunner, OrchestratorConfig, Pipeline};
use giotto_core::{HaltPoint, JobType, PipelineState, Progress, StoryInputs};
use giotto_error::{GiottoResult, PipelineError, PipelineErrorKind};
use giotto_interface::{PipelineStore, Runner, StoryProducer};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

type StagePipeline = Pipeline<PipelineState, PipelineState>;

/// Drives a run from inputs to assembled chapters.
///
/// Each registered stage runs as `expand -> checkpoint -> worker ->
/// checkpoint`. Stages run strictly in order; a stage that is still
/// incomplete after its worker ran (some jobs failed) stops the pass, and
/// the next [`Orchestrator::resume`] picks up from there. Failed jobs are
/// part of the returned state rather than an error. Only persistence
/// failures and a story that cannot be produced are returned as `Err`.
pub struct Orchestrator<S, P> {
    store: Arc<S>,
    producer: Arc<P>,
    config: OrchestratorConfig,
    stages: BTreeMap<JobType, StagePipeline>,
}

impl<S, P> Orchestrator<S, P>
where
    S: PipelineStore + 'static,
    P: StoryProducer + 'static,
{
    /// Orchestrator with no stage workers registered yet.
    pub fn new(store: Arc<S>, producer: Arc<P>, config: OrchestratorConfig) -> Self {
        Self {
            store,
            producer,
            config,
            stages: BTreeMap::new(),
        }
    }

    /// Register the runner executing the jobs of `job_type`.
    pub fn with_stage<R>(mut self, job_type: JobType, runner: R) -> Self
    where
        R: Runner<PipelineState, PipelineState> + 'static,
    {
        let pipeline = Pipeline::new(ExpandRunner::new(job_type, *self.config.max_retries()))
            .then(CheckpointRunner::new(
                Arc::clone(&self.store),
                format!("checkpoint:{}:expanded", job_type),
            ))
            .then(runner)
            .then(CheckpointRunner::new(
                Arc::clone(&self.store),
                format!("checkpoint:{}:ran", job_type),
            ));
        self.stages.insert(job_type, pipeline);
        self
    }

    /// Durable store backing the orchestrator.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Step names of a registered stage, for diagnostics.
    pub fn describe_stage(&self, job_type: JobType) -> Option<String> {
        self.stages.get(&job_type).map(Pipeline::describe)
    }

    /// Start a run, or continue one that already exists under `run_id`.
    ///
    /// The story is produced once and persisted before any stage runs. A run
    /// that is halted is returned unchanged; use [`Orchestrator::resume`] to
    /// continue it.
    #[instrument(skip(self, inputs), fields(chapters = *inputs.chapter_count()))]
    pub async fn generate(&self, run_id: &str, inputs: StoryInputs) -> GiottoResult<PipelineState> {
        let mut state = match self.store.load(run_id, self.config.base_dir()).await? {
            Some(state) => state,
            None => {
                info!("Starting new run");
                PipelineState::new(run_id, self.config.base_dir())
            }
        };

        if let Some(halt) = state.halted_at() {
            info!(%halt, "Run is halted, resume to continue");
            return Ok(state);
        }

        if state.story().is_none() {
            state.set_inputs(Some(inputs));
            self.store.save(&state).await?;
            self.produce_story(&mut state).await?;

            if *self.config.halt_after() == Some(HaltPoint::AfterStory) {
                info!("Halting after story");
                state.set_halted_at(Some(HaltPoint::AfterStory));
                self.store.save(&state).await?;
                return Ok(state);
            }
        }

        self.run_stages(state).await
    }

    /// Continue a saved run from its first incomplete stage.
    ///
    /// Clears any halt. If the story was never produced, the outline is
    /// retried from the persisted inputs.
    #[instrument(skip(self))]
    pub async fn resume(&self, run_id: &str) -> GiottoResult<PipelineState> {
        let mut state = self
            .store
            .load(run_id, self.config.base_dir())
            .await?
            .ok_or_else(|| PipelineError::new(PipelineErrorKind::RunNotFound(run_id.to_string())))?;

        if state.halted_at().is_some() {
            state.set_halted_at(None);
            self.store.save(&state).await?;
        }
        if state.story().is_none() {
            self.produce_story(&mut state).await?;
        }

        self.run_stages(state).await
    }

    /// Job counts of a saved run.
    #[instrument(skip(self))]
    pub async fn status(&self, run_id: &str) -> GiottoResult<Progress> {
        self.store.progress(run_id).await
    }

    async fn produce_story(&self, state: &mut PipelineState) -> GiottoResult<()> {
        let run_id = state.run_id().clone();
        let upstream = move |message: String| {
            PipelineError::new(PipelineErrorKind::UpstreamArtifact {
                run_id: run_id.clone(),
                message,
            })
        };
        let Some(inputs) = state.inputs().clone() else {
            return Err(upstream("no inputs were saved for this run".to_string()).into());
        };

        match self.producer.outline(&inputs).await {
            Ok(story) => {
                info!(
                    producer = self.producer.producer_name(),
                    chapters = story.chapters().len(),
                    characters = story.characters().len(),
                    "Story produced"
                );
                state.set_story(Some(story));
                self.store.save(state).await
            }
            Err(e) => {
                let err = upstream(e.to_string());
                warn!(error = %e, "Story could not be produced");
                self.store.save(state).await?;
                Err(err.into())
            }
        }
    }

    #[instrument(skip_all, fields(run_id = %state.run_id()))]
    async fn run_stages(&self, mut state: PipelineState) -> GiottoResult<PipelineState> {
        for job_type in JobType::ALL {
            if state.is_stage_complete(job_type) {
                continue;
            }
            let stage = self.stages.get(&job_type).ok_or_else(|| {
                PipelineError::new(PipelineErrorKind::MissingWorker(job_type.to_string()))
            })?;

            debug!(%job_type, steps = %stage.describe(), "Running stage");
            state = stage.execute(state).await?;

            if !state.is_stage_complete(job_type) {
                info!(%job_type, progress = %state.progress(), "Stage incomplete, stopping");
                break;
            }
            if *self.config.halt_after() == Some(HaltPoint::AfterStage(job_type))
                && job_type.next().is_some()
            {
                info!(%job_type, "Halting after stage");
                state.set_halted_at(Some(HaltPoint::AfterStage(job_type)));
                self.store.save(&state).await?;
                break;
            }
        }

        if state.is_complete() {
            info!("Run complete");
        }
        Ok(state)
    }
}
