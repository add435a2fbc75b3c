//! Jobs: the typed, stateful units of pipeline work.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default retry budget for a job before it is given up on.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Stage tag. Declaration order is dependency order.
///
/// # Examples
///
/// ```
/// use giotto_core::JobType;
///
/// assert!(JobType::Plot < JobType::Image);
/// assert_eq!(JobType::Plot.next(), Some(JobType::Character));
/// assert_eq!("post_production".parse::<JobType>().unwrap(), JobType::PostProduction);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    /// Chapter prose and scene breakdown
    Plot,
    /// Character reference portraits
    Character,
    /// Scene panel images
    Image,
    /// Scene clips animated from panels
    Video,
    /// Per-chapter assembly
    PostProduction,
}

impl JobType {
    /// All stages in dependency order.
    pub const ALL: [JobType; 5] = [
        JobType::Plot,
        JobType::Character,
        JobType::Image,
        JobType::Video,
        JobType::PostProduction,
    ];

    /// Stage that runs after this one.
    pub fn next(self) -> Option<JobType> {
        let idx = Self::ALL.iter().position(|t| *t == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Stage that must be complete before this one may start.
    pub fn previous(self) -> Option<JobType> {
        let idx = Self::ALL.iter().position(|t| *t == self)?;
        idx.checked_sub(1).map(|i| Self::ALL[i])
    }
}

/// Lifecycle status of a job.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    /// Not yet attempted
    Pending,
    /// Being worked on by the current invocation
    InProgress,
    /// Output exists and is referenced by `output_ref`
    Completed,
    /// Last attempt failed; retried on the next run
    Failed,
    /// Given up on; terminal
    Skipped,
}

impl JobStatus {
    /// Terminal states are never revisited by a stage worker.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Skipped)
    }

    /// Whether a stage worker should pick the job up.
    pub fn is_runnable(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Failed)
    }
}

/// One unit of pipeline work.
///
/// Mutation goes through the transition methods, which keep `output_ref`
/// set exactly when the job is completed.
///
/// # Examples
///
/// ```
/// use giotto_core::{Job, JobStatus, JobType};
///
/// let mut job = Job::new("r1", JobType::Plot, "ch01").with_metadata("chapter", "1");
/// assert_eq!(job.id(), "r1:plot:ch01");
///
/// job.start();
/// job.complete("/tmp/r1/output/ch01.json");
/// assert_eq!(*job.status(), JobStatus::Completed);
/// assert!(job.output_ref().is_some());
/// ```
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct Job {
    /// Unique identifier within a run
    id: String,
    /// Stage this job belongs to
    job_type: JobType,
    /// Current lifecycle status
    #[builder(default = JobStatus::Pending)]
    status: JobStatus,
    /// Chapter, scene or character key
    #[builder(default)]
    correlation: Option<String>,
    /// Free-form parameters (prompt, reference, chapter number, ...)
    #[builder(default)]
    metadata: BTreeMap<String, String>,
    /// Last failure message
    #[builder(default)]
    error: Option<String>,
    /// Path of the produced output, set iff completed
    #[builder(default)]
    output_ref: Option<String>,
    /// Attempts that ended in failure
    #[builder(default)]
    retry_count: u32,
    /// Failures tolerated before the job is skipped
    #[builder(default = DEFAULT_MAX_RETRIES)]
    max_retries: u32,
    /// Creation time
    #[builder(default = Utc::now())]
    created_at: DateTime<Utc>,
    /// Last transition time
    #[builder(default = Utc::now())]
    updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job with a deterministic id.
    pub fn new(run_id: &str, job_type: JobType, correlation: impl Into<String>) -> Self {
        let correlation = correlation.into();
        let now = Utc::now();
        Self {
            id: Self::make_id(run_id, job_type, &correlation),
            job_type,
            status: JobStatus::Pending,
            correlation: Some(correlation),
            metadata: BTreeMap::new(),
            error: None,
            output_ref: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder used when restoring a job from persisted columns.
    pub fn builder() -> JobBuilder {
        JobBuilder::default()
    }

    /// Identifier scheme: `{run_id}:{job_type}:{correlation}`.
    pub fn make_id(run_id: &str, job_type: JobType, correlation: &str) -> String {
        format!("{}:{}:{}", run_id, job_type, correlation)
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Look up a metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Mark the job as being worked on.
    pub fn start(&mut self) {
        self.status = JobStatus::InProgress;
        self.touch();
    }

    /// Record a produced output.
    pub fn complete(&mut self, output_ref: impl Into<String>) {
        self.status = JobStatus::Completed;
        self.output_ref = Some(output_ref.into());
        self.error = None;
        self.touch();
    }

    /// Record a failed attempt. Exhausting the retry budget skips the job.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.retry_count += 1;
        self.error = Some(message.into());
        self.output_ref = None;
        self.status = if self.retry_count >= self.max_retries {
            JobStatus::Skipped
        } else {
            JobStatus::Failed
        };
        self.touch();
    }

    /// Give up on the job without attempting it.
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = JobStatus::Skipped;
        self.error = Some(reason.into());
        self.output_ref = None;
        self.touch();
    }

    /// Return the job to pending, dropping any previous output.
    pub fn reset(&mut self) {
        self.status = JobStatus::Pending;
        self.output_ref = None;
        self.touch();
    }

    /// Repair a job read back from storage.
    ///
    /// An `in_progress` row means the previous process died mid-job, so it is
    /// treated as pending. A completed row without an output, or an output on
    /// a non-completed row, is brought back in line with the output invariant.
    pub fn normalized(mut self) -> Self {
        match self.status {
            JobStatus::InProgress => {
                tracing::debug!(job_id = %self.id, "Recovering interrupted job as pending");
                self.status = JobStatus::Pending;
                self.output_ref = None;
            }
            JobStatus::Completed if self.output_ref.is_none() => {
                self.status = JobStatus::Pending;
            }
            JobStatus::Completed => {}
            _ => self.output_ref = None,
        }
        self
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_counts_attempts_and_skips_when_budget_is_spent() {
        let mut job = Job::new("r1", JobType::Image, "ch01_s01").with_max_retries(2);

        job.fail("timeout");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 1);

        job.fail("timeout again");
        assert_eq!(job.status, JobStatus::Skipped);
        assert_eq!(job.error.as_deref(), Some("timeout again"));
        assert!(job.output_ref.is_none());
    }

    #[test]
    fn complete_clears_previous_error() {
        let mut job = Job::new("r1", JobType::Plot, "ch02");
        job.fail("provider 503");
        job.complete("/out/ch02.json");
        assert!(job.error.is_none());
        assert_eq!(job.output_ref.as_deref(), Some("/out/ch02.json"));
    }

    #[test]
    fn normalized_recovers_interrupted_jobs() {
        let mut job = Job::new("r1", JobType::Video, "ch01_s02");
        job.start();
        let job = job.normalized();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn normalized_enforces_output_invariant() {
        let job = Job::builder()
            .id("r1:plot:ch01")
            .job_type(JobType::Plot)
            .status(JobStatus::Failed)
            .output_ref(Some("/stale".to_string()))
            .build()
            .unwrap()
            .normalized();
        assert!(job.output_ref.is_none());

        let job = Job::builder()
            .id("r1:plot:ch02")
            .job_type(JobType::Plot)
            .status(JobStatus::Completed)
            .build()
            .unwrap()
            .normalized();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn job_types_walk_in_dependency_order() {
        assert_eq!(JobType::Plot.previous(), None);
        assert_eq!(JobType::Video.previous(), Some(JobType::Image));
        assert_eq!(JobType::PostProduction.next(), None);
        assert_eq!(JobType::Image.to_string(), "image");
    }
}
