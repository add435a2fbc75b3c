//! Deterministic on-disk layout of a run.

use crate::{Job, JobType};
use derive_getters::Getters;
use giotto_error::{GiottoResult, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};

/// Directory layout for one run.
///
/// Every path is a pure function of `(base_dir, run_id)`, so a resumed run
/// finds the outputs of an earlier process without storing any paths.
///
/// ```text
/// {base}/{run_id}/
/// ├── characters/   portraits        {slug}.png
/// ├── images/       scene panels     ch01_s01.png
/// ├── videos/       scene clips      ch01_s01.mp4
/// ├── audio/
/// └── output/       chapter drafts   ch01.json
///                   assemblies       ch01_final.json
/// ```
///
/// # Examples
///
/// ```
/// use giotto_core::{Job, JobType, RunLayout};
/// use std::path::Path;
///
/// let layout = RunLayout::new("/data", "r1");
/// assert_eq!(layout.images(), Path::new("/data/r1/images"));
///
/// let job = Job::new("r1", JobType::Image, "ch02_s03");
/// assert_eq!(layout.output_path(&job), Path::new("/data/r1/images/ch02_s03.png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct RunLayout {
    base_dir: PathBuf,
    run_dir: PathBuf,
    characters: PathBuf,
    images: PathBuf,
    videos: PathBuf,
    audio: PathBuf,
    output: PathBuf,
}

impl RunLayout {
    /// Compute the layout for a run.
    pub fn new(base_dir: impl AsRef<Path>, run_id: &str) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let run_dir = base_dir.join(run_id);
        Self {
            characters: run_dir.join("characters"),
            images: run_dir.join("images"),
            videos: run_dir.join("videos"),
            audio: run_dir.join("audio"),
            output: run_dir.join("output"),
            run_dir,
            base_dir,
        }
    }

    /// Directory holding outputs of a stage.
    pub fn dir_for(&self, job_type: JobType) -> &Path {
        match job_type {
            JobType::Plot | JobType::PostProduction => &self.output,
            JobType::Character => &self.characters,
            JobType::Image => &self.images,
            JobType::Video => &self.videos,
        }
    }

    /// Output file for a job, derived from its type and correlation key.
    pub fn output_path(&self, job: &Job) -> PathBuf {
        let key = job
            .correlation()
            .clone()
            .unwrap_or_else(|| job.id().replace([':', '/'], "_"));
        self.path_for(*job.job_type(), &key)
    }

    /// Output file for a stage and correlation key.
    pub fn path_for(&self, job_type: JobType, key: &str) -> PathBuf {
        let file = match job_type {
            JobType::Plot => format!("{}.json", key),
            JobType::Character | JobType::Image => format!("{}.png", key),
            JobType::Video => format!("{}.mp4", key),
            JobType::PostProduction => format!("{}_final.json", key),
        };
        self.dir_for(job_type).join(file)
    }

    /// Create every directory of the layout.
    #[tracing::instrument(skip(self), fields(run_dir = %self.run_dir.display()))]
    pub fn ensure(&self) -> GiottoResult<()> {
        for dir in [
            &self.characters,
            &self.images,
            &self.videos,
            &self.audio,
            &self.output,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })?;
        }
        tracing::debug!("Run directories ready");
        Ok(())
    }
}

/// Whether a usable output already exists at `path`.
///
/// Empty files are left behind by interrupted writes and do not count.
pub fn output_exists(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_a_pure_function_of_base_and_run() {
        assert_eq!(RunLayout::new("/a", "r1"), RunLayout::new("/a", "r1"));
        assert_ne!(RunLayout::new("/a", "r1"), RunLayout::new("/a", "r2"));
    }

    #[test]
    fn output_paths_follow_stage_and_key() {
        let layout = RunLayout::new("/data", "r1");
        assert_eq!(
            layout.path_for(JobType::Plot, "ch04"),
            Path::new("/data/r1/output/ch04.json")
        );
        assert_eq!(
            layout.path_for(JobType::PostProduction, "ch04"),
            Path::new("/data/r1/output/ch04_final.json")
        );
        assert_eq!(
            layout.path_for(JobType::Character, "mara-vance"),
            Path::new("/data/r1/characters/mara-vance.png")
        );
        assert_eq!(
            layout.path_for(JobType::Video, "ch01_s02"),
            Path::new("/data/r1/videos/ch01_s02.mp4")
        );
    }

    #[test]
    fn empty_files_are_not_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch01.json");
        assert!(!output_exists(&path));
        std::fs::write(&path, b"").unwrap();
        assert!(!output_exists(&path));
        std::fs::write(&path, b"{}").unwrap();
        assert!(output_exists(&path));
    }
}
