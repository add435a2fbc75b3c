//! Aggregated job counts for a run.

use crate::{Job, JobStatus};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Snapshot of how far a run has come.
///
/// `pending` includes jobs that were in progress. Completed and skipped jobs
/// both count towards `percent`, since neither will be attempted again.
///
/// # Examples
///
/// ```
/// use giotto_core::Progress;
///
/// let p = Progress::from_counts(6, 1, 0, 1);
/// assert_eq!(*p.total(), 8);
/// assert_eq!(*p.percent(), 87.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Getters)]
pub struct Progress {
    total: usize,
    completed: usize,
    failed: usize,
    pending: usize,
    skipped: usize,
    percent: f64,
}

impl Progress {
    /// Build from per-status counts.
    pub fn from_counts(completed: usize, failed: usize, pending: usize, skipped: usize) -> Self {
        let total = completed + failed + pending + skipped;
        let percent = if total == 0 {
            0.0
        } else {
            (completed + skipped) as f64 / total as f64 * 100.0
        };
        Self {
            total,
            completed,
            failed,
            pending,
            skipped,
            percent,
        }
    }

    /// Count a set of jobs.
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let (mut completed, mut failed, mut pending, mut skipped) = (0, 0, 0, 0);
        for job in jobs {
            match job.status() {
                JobStatus::Completed => completed += 1,
                JobStatus::Failed => failed += 1,
                JobStatus::Pending | JobStatus::InProgress => pending += 1,
                JobStatus::Skipped => skipped += 1,
            }
        }
        Self::from_counts(completed, failed, pending, skipped)
    }

    /// Whether every job has reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} done ({:.1}%), {} failed, {} pending, {} skipped",
            self.completed + self.skipped,
            self.total,
            self.percent,
            self.failed,
            self.pending,
            self.skipped
        )
    }
}
