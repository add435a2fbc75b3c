use super::{JobHandler, StageContext, ensure_parent, finalize_temp, temp_path};
use async_trait::async_trait;
use giotto_cache::{CacheKey, ResponseCache};
use giotto_core::{Job, JobType, output_exists};
use giotto_error::{
    GenerationError, GenerationErrorKind, GiottoResult, PipelineError, PipelineErrorKind,
};
use giotto_interface::{MediaProvider, RawMedia};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Character, image and video handler backed by a [`MediaProvider`].
///
/// The prompt comes from the job's `prompt` metadata and an optional
/// `reference` entry names a file produced by an earlier stage. Responses
/// are memoized in the injected cache, keyed on provider, stage, prompt and
/// reference.
pub struct MediaHandler<M> {
    provider: M,
    job_type: JobType,
    resource_key: String,
    cache: Option<Arc<ResponseCache<RawMedia>>>,
}

impl<M: MediaProvider> MediaHandler<M> {
    /// Handler for one media stage, rate limited under the provider's name.
    pub fn new(provider: M, job_type: JobType) -> Self {
        let resource_key = provider.provider_name().to_string();
        Self {
            provider,
            job_type,
            resource_key,
            cache: None,
        }
    }

    /// Share a response cache with this handler.
    pub fn with_cache(mut self, cache: Arc<ResponseCache<RawMedia>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the rate limit key.
    pub fn with_resource_key(mut self, key: impl Into<String>) -> Self {
        self.resource_key = key.into();
        self
    }

    fn reference(job: &Job) -> GiottoResult<Option<PathBuf>> {
        let Some(reference) = job.meta("reference") else {
            return Ok(None);
        };
        let path = PathBuf::from(reference);
        if !output_exists(&path) {
            return Err(PipelineError::new(PipelineErrorKind::MissingAsset {
                job_id: job.id().clone(),
                path: reference.to_string(),
            })
            .into());
        }
        Ok(Some(path))
    }
}

#[async_trait]
impl<M: MediaProvider + 'static> JobHandler for MediaHandler<M> {
    fn job_type(&self) -> JobType {
        self.job_type
    }

    fn resource_key(&self) -> &str {
        &self.resource_key
    }

    #[instrument(skip_all, fields(job_id = %job.id(), provider = self.provider.provider_name()))]
    async fn handle(&self, job: &Job, _ctx: &StageContext, output: &Path) -> GiottoResult<()> {
        let prompt = job
            .meta("prompt")
            .map(str::to_string)
            .or_else(|| job.correlation().clone())
            .unwrap_or_default();
        let reference = Self::reference(job)?;
        let reference_key = reference
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let key = CacheKey::new(
            self.provider.provider_name(),
            &[self.job_type.as_ref(), prompt.as_str(), reference_key.as_str()],
        );

        let cached = self.cache.as_ref().and_then(|c| c.get(&key));
        let media = match cached {
            Some(media) => {
                debug!("Using cached response");
                media
            }
            None => {
                let media = self.provider.generate(&prompt, reference.as_deref()).await?;
                if media.is_empty() {
                    return Err(GenerationError::new(GenerationErrorKind::EmptyOutput(
                        job.id().clone(),
                    ))
                    .into());
                }
                if let Some(cache) = &self.cache {
                    cache.insert(key, media.clone());
                }
                media
            }
        };

        ensure_parent(output).await?;
        let tmp = temp_path(output);
        self.provider.render(&tmp, &media).await?;
        finalize_temp(&tmp, output).await?;

        debug!(bytes = media.bytes().len(), mime = %media.mime_type(), "Media rendered");
        Ok(())
    }
}
