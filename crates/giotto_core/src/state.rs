//! Per-run pipeline state.

use crate::{Job, JobStatus, JobType, Progress, RunLayout, Story, StoryInputs};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use giotto_error::{GiottoResult, PipelineError, PipelineErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

/// Where a run stops for human review.
///
/// Persisted as `story` for [`HaltPoint::AfterStory`] and as the stage tag
/// for [`HaltPoint::AfterStage`].
///
/// ```
/// use giotto_core::{HaltPoint, JobType};
///
/// assert_eq!("story".parse::<HaltPoint>().unwrap(), HaltPoint::AfterStory);
/// assert_eq!(HaltPoint::AfterStage(JobType::Image).to_string(), "image");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HaltPoint {
    /// After the story outline, before any media is generated
    AfterStory,
    /// After the given stage completes
    AfterStage(JobType),
}

impl std::fmt::Display for HaltPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltPoint::AfterStory => f.write_str("story"),
            HaltPoint::AfterStage(stage) => write!(f, "{}", stage),
        }
    }
}

impl FromStr for HaltPoint {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "story" {
            return Ok(HaltPoint::AfterStory);
        }
        JobType::from_str(s)
            .map(HaltPoint::AfterStage)
            .map_err(|_| {
                PipelineError::new(PipelineErrorKind::InvalidTag {
                    field: "halted_at",
                    value: s.to_string(),
                })
            })
    }
}

impl TryFrom<String> for HaltPoint {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HaltPoint> for String {
    fn from(value: HaltPoint) -> Self {
        value.to_string()
    }
}

/// Everything known about one run: its jobs, stage flags and story.
///
/// The layout is never persisted; it is recomputed from the base directory
/// on load so the same run always resolves to the same files.
///
/// # Examples
///
/// ```
/// use giotto_core::{Job, JobType, PipelineState};
///
/// let mut state = PipelineState::new("r1", "/tmp/giotto");
/// assert!(state.push_job(Job::new("r1", JobType::Plot, "ch01")));
/// assert!(!state.push_job(Job::new("r1", JobType::Plot, "ch01")));
/// assert_eq!(state.first_incomplete_stage(), Some(JobType::Plot));
/// ```
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct PipelineState {
    run_id: String,
    layout: RunLayout,
    jobs: Vec<Job>,
    stage_complete: BTreeMap<JobType, bool>,
    story: Option<Story>,
    inputs: Option<StoryInputs>,
    halted_at: Option<HaltPoint>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PipelineState {
    /// Fresh state for a run with no jobs and no completed stages.
    pub fn new(run_id: impl Into<String>, base_dir: impl AsRef<Path>) -> Self {
        let run_id = run_id.into();
        let now = Utc::now();
        Self {
            layout: RunLayout::new(base_dir, &run_id),
            run_id,
            jobs: Vec::new(),
            stage_complete: JobType::ALL.iter().map(|t| (*t, false)).collect(),
            story: None,
            inputs: None,
            halted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Jobs of one stage, in creation order.
    pub fn jobs_of(&self, job_type: JobType) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(move |j| *j.job_type() == job_type)
    }

    /// Jobs of one stage a worker should attempt.
    pub fn runnable_jobs(&self, job_type: JobType) -> impl Iterator<Item = &Job> {
        self.jobs_of(job_type).filter(|j| j.status().is_runnable())
    }

    /// Whether the stage has been expanded into jobs.
    pub fn has_jobs(&self, job_type: JobType) -> bool {
        self.jobs_of(job_type).next().is_some()
    }

    /// Look up a job by id.
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id() == id)
    }

    /// Mutable access to a job by id.
    pub fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id() == id)
    }

    /// Append a job. Returns `false` and leaves the state untouched when a
    /// job with the same id already exists.
    pub fn push_job(&mut self, job: Job) -> bool {
        if self.job(job.id()).is_some() {
            return false;
        }
        self.jobs.push(job);
        true
    }

    /// Replace a job with an updated copy of itself.
    pub fn replace_job(&mut self, job: Job) -> GiottoResult<()> {
        let slot = self
            .job_mut(job.id())
            .ok_or_else(|| PipelineError::new(PipelineErrorKind::JobNotFound(job.id().clone())))?;
        *slot = job;
        Ok(())
    }

    /// Whether the stage flag is set.
    pub fn is_stage_complete(&self, job_type: JobType) -> bool {
        self.stage_complete.get(&job_type).copied().unwrap_or(false)
    }

    /// Set the stage flag if no job of the stage is pending or failed.
    ///
    /// Returns whether the flag is now set. Flags are never cleared.
    pub fn mark_stage_complete(&mut self, job_type: JobType) -> bool {
        if self.is_stage_complete(job_type) {
            return true;
        }
        let unsettled = self
            .jobs_of(job_type)
            .any(|j| !j.status().is_terminal());
        if unsettled {
            return false;
        }
        self.stage_complete.insert(job_type, true);
        self.touch();
        true
    }

    /// Restore persisted stage flags. Only sets, never clears.
    pub fn restore_stage_flags(&mut self, flags: impl IntoIterator<Item = (JobType, bool)>) {
        for (job_type, done) in flags {
            if done {
                self.stage_complete.insert(job_type, true);
            }
        }
    }

    /// Earliest stage whose flag is not yet set.
    pub fn first_incomplete_stage(&self) -> Option<JobType> {
        JobType::ALL
            .into_iter()
            .find(|t| !self.is_stage_complete(*t))
    }

    /// Whether every stage has completed.
    pub fn is_complete(&self) -> bool {
        self.first_incomplete_stage().is_none()
    }

    /// Chapter numbers whose plot job completed.
    pub fn chapters_generated(&self) -> BTreeSet<u32> {
        self.jobs_of(JobType::Plot)
            .filter(|j| *j.status() == JobStatus::Completed)
            .filter_map(|j| j.meta("chapter").and_then(|c| c.parse().ok()))
            .collect()
    }

    /// Counts across every job of the run.
    pub fn progress(&self) -> Progress {
        Progress::from_jobs(&self.jobs)
    }

    /// Record the upstream story.
    pub fn set_story(&mut self, story: Option<Story>) {
        self.story = story;
        self.touch();
    }

    /// Record the inputs the run was started with.
    pub fn set_inputs(&mut self, inputs: Option<StoryInputs>) {
        self.inputs = inputs;
        self.touch();
    }

    /// Record or clear a halt.
    pub fn set_halted_at(&mut self, halted_at: Option<HaltPoint>) {
        self.halted_at = halted_at;
        self.touch();
    }

    /// Restore persisted timestamps.
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
