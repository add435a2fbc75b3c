//! Runners that wrap stage work with persistence and expansion.

use crate::expand_stage;
use async_trait::async_trait;
use giotto_core::{JobType, PipelineState};
use giotto_error::GiottoResult;
use giotto_interface::{PipelineStore, Runner};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Persists the state it is given and passes it on unchanged.
pub struct CheckpointRunner<S> {
    store: Arc<S>,
    label: String,
}

impl<S: PipelineStore> CheckpointRunner<S> {
    /// Checkpoint into `store`, logged under `label`.
    pub fn new(store: Arc<S>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }
}

#[async_trait]
impl<S: PipelineStore + 'static> Runner<PipelineState, PipelineState> for CheckpointRunner<S> {
    #[instrument(skip_all, fields(run_id = %state.run_id(), label = %self.label))]
    async fn run(&self, state: PipelineState) -> GiottoResult<PipelineState> {
        self.store.save(&state).await?;
        debug!(progress = %state.progress(), "Checkpoint saved");
        Ok(state)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Adds the jobs of one stage to the state if it has none yet.
#[derive(Debug, Clone)]
pub struct ExpandRunner {
    job_type: JobType,
    max_retries: u32,
    name: String,
}

impl ExpandRunner {
    /// Expand `job_type`, giving each new job `max_retries` attempts.
    pub fn new(job_type: JobType, max_retries: u32) -> Self {
        Self {
            job_type,
            max_retries,
            name: format!("expand:{}", job_type),
        }
    }
}

#[async_trait]
impl Runner<PipelineState, PipelineState> for ExpandRunner {
    async fn run(&self, mut state: PipelineState) -> GiottoResult<PipelineState> {
        expand_stage(&mut state, self.job_type, self.max_retries)?;
        Ok(state)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
