//! Per-job work performed by a stage worker.
//!
//! A [`JobHandler`] turns one job into one output file. It never touches job
//! status; the worker owns the lifecycle and the handler only produces bytes
//! at the path it is given.

mod assembly;
mod chapter;
mod media;

pub use assembly::{AssemblyHandler, ChapterManifest};
pub use chapter::ChapterHandler;
pub use media::MediaHandler;

use async_trait::async_trait;
use derive_getters::Getters;
use giotto_core::{Job, JobType, PipelineState, RunLayout, Story, StoryInputs};
use giotto_error::{GiottoResult, PipelineError, PipelineErrorKind, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only view of the run shared by every job of a stage.
#[derive(Debug, Clone, Getters)]
pub struct StageContext {
    /// Run identifier
    run_id: String,
    /// Output directories of the run
    layout: RunLayout,
    /// Upstream story, once produced
    story: Option<Story>,
    /// Inputs the run was started with
    inputs: Option<StoryInputs>,
}

impl StageContext {
    /// Snapshot the parts of a state handlers may read.
    pub fn from_state(state: &PipelineState) -> Self {
        Self {
            run_id: state.run_id().clone(),
            layout: state.layout().clone(),
            story: state.story().clone(),
            inputs: state.inputs().clone(),
        }
    }

    /// The upstream story, which every stage after the outline relies on.
    pub fn require_story(&self) -> GiottoResult<&Story> {
        self.story.as_ref().ok_or_else(|| {
            PipelineError::new(PipelineErrorKind::UpstreamArtifact {
                run_id: self.run_id.clone(),
                message: "story has not been produced".to_string(),
            })
            .into()
        })
    }
}

/// Produces the output file of one job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Stage the handler serves.
    fn job_type(&self) -> JobType;

    /// Key under which calls are rate limited.
    fn resource_key(&self) -> &str;

    /// Write the job's output to `output`.
    ///
    /// Implementations must write atomically so an interrupted call never
    /// leaves a partial file at `output`.
    async fn handle(&self, job: &Job, ctx: &StageContext, output: &Path) -> GiottoResult<()>;
}

#[async_trait]
impl<H: JobHandler> JobHandler for Arc<H> {
    fn job_type(&self) -> JobType {
        (**self).job_type()
    }

    fn resource_key(&self) -> &str {
        (**self).resource_key()
    }

    async fn handle(&self, job: &Job, ctx: &StageContext, output: &Path) -> GiottoResult<()> {
        (**self).handle(job, ctx, output).await
    }
}

/// Sibling path an output is staged at before being renamed into place.
pub fn temp_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    output.with_file_name(name)
}

/// Write `bytes` to `output` through a temporary file and a rename.
pub async fn write_atomic(output: &Path, bytes: &[u8]) -> GiottoResult<()> {
    ensure_parent(output).await?;
    let tmp = temp_path(output);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| write_error(&tmp, e))?;
    finalize_temp(&tmp, output).await
}

/// Move a fully written temporary file into place.
pub async fn finalize_temp(tmp: &Path, output: &Path) -> GiottoResult<()> {
    tokio::fs::rename(tmp, output)
        .await
        .map_err(|e| write_error(output, e))?;
    Ok(())
}

pub(crate) async fn ensure_parent(output: &Path) -> GiottoResult<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                parent.display(),
                e
            )))
        })?;
    }
    Ok(())
}

fn write_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::new(StorageErrorKind::FileWrite(format!(
        "{}: {}",
        path.display(),
        e
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_a_sibling() {
        let tmp = temp_path(Path::new("/r1/images/ch01_s01.png"));
        assert_eq!(tmp, Path::new("/r1/images/ch01_s01.png.tmp"));
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/ch01.json");

        write_atomic(&output, b"{}").await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"{}");
        assert!(!temp_path(&output).exists());
    }
}
