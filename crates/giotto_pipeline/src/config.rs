//! Orchestrator and stage settings.

use derive_getters::Getters;
use giotto_core::{DEFAULT_MAX_RETRIES, HaltPoint, JobType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Jobs run at once within each stage.
///
/// ```toml
/// [concurrency]
/// plot = 3
/// image = 4
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct StageConcurrency {
    /// Chapter drafts
    #[serde(default = "default_plot")]
    plot: usize,
    /// Character portraits
    #[serde(default = "default_media")]
    character: usize,
    /// Scene panels
    #[serde(default = "default_media")]
    image: usize,
    /// Scene clips
    #[serde(default = "default_media")]
    video: usize,
    /// Chapter assembly
    #[serde(default = "default_post")]
    post_production: usize,
}

fn default_plot() -> usize {
    3
}

fn default_media() -> usize {
    2
}

fn default_post() -> usize {
    1
}

impl Default for StageConcurrency {
    fn default() -> Self {
        Self {
            plot: default_plot(),
            character: default_media(),
            image: default_media(),
            video: default_media(),
            post_production: default_post(),
        }
    }
}

impl StageConcurrency {
    /// Concurrency configured for a stage, never below one.
    pub fn for_stage(&self, job_type: JobType) -> usize {
        let n = match job_type {
            JobType::Plot => self.plot,
            JobType::Character => self.character,
            JobType::Image => self.image,
            JobType::Video => self.video,
            JobType::PostProduction => self.post_production,
        };
        n.max(1)
    }
}

/// Settings the orchestrator needs for every run.
#[derive(Debug, Clone, PartialEq, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct OrchestratorConfig {
    /// Root under which each run gets its own directory
    base_dir: PathBuf,
    /// Optional stopping point for inspection
    #[builder(default)]
    halt_after: Option<HaltPoint>,
    /// Failures tolerated per job before it is skipped
    #[builder(default = DEFAULT_MAX_RETRIES)]
    max_retries: u32,
}

impl OrchestratorConfig {
    /// Defaults rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            halt_after: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Start building a configuration.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }
}
