use super::{JobHandler, StageContext, write_atomic};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use giotto_core::{Job, JobType, output_exists};
use giotto_error::{GiottoResult, JsonError, PipelineError, PipelineErrorKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Final per-chapter artifact listing everything produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ChapterManifest {
    /// 1-based chapter number
    chapter: u32,
    /// Chapter title
    title: String,
    /// Chapter prose
    text: String,
    /// Panel image paths in scene order
    panels: Vec<String>,
    /// Clip paths in scene order
    clips: Vec<String>,
    /// When the manifest was written
    assembled_at: DateTime<Utc>,
}

/// Post-production handler. Purely local: no collaborator is called.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyHandler;

impl AssemblyHandler {
    /// Create the handler.
    pub fn new() -> Self {
        Self
    }

    fn list(job: &Job, key: &str) -> GiottoResult<Vec<String>> {
        match job.meta(key) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| JsonError::new(format!("{} '{}': {}", job.id(), key, e)).into()),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl JobHandler for AssemblyHandler {
    fn job_type(&self) -> JobType {
        JobType::PostProduction
    }

    fn resource_key(&self) -> &str {
        "local"
    }

    #[instrument(skip_all, fields(job_id = %job.id()))]
    async fn handle(&self, job: &Job, _ctx: &StageContext, output: &Path) -> GiottoResult<()> {
        let panels = Self::list(job, "panels")?;
        let clips = Self::list(job, "clips")?;

        if let Some(missing) = panels
            .iter()
            .chain(clips.iter())
            .find(|p| !output_exists(Path::new(p)))
        {
            return Err(PipelineError::new(PipelineErrorKind::MissingAsset {
                job_id: job.id().clone(),
                path: missing.clone(),
            })
            .into());
        }

        let manifest = ChapterManifest {
            chapter: job
                .meta("chapter")
                .and_then(|c| c.parse().ok())
                .unwrap_or_default(),
            title: job.meta("title").unwrap_or_default().to_string(),
            text: job.meta("text").unwrap_or_default().to_string(),
            panels,
            clips,
            assembled_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| JsonError::new(format!("{}: {}", job.id(), e)))?;
        write_atomic(output, &json).await?;

        debug!(
            chapter = manifest.chapter,
            panels = manifest.panels.len(),
            clips = manifest.clips.len(),
            "Chapter assembled"
        );
        Ok(())
    }
}
