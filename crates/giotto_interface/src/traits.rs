//! Trait definitions for pipeline composition and external collaborators.

use crate::{RatePermit, RawMedia};
use async_trait::async_trait;
use giotto_core::{ChapterDraft, ChapterOutline, PipelineState, Progress, Story, StoryInputs};
use giotto_error::{GiottoResult, StorageError, StorageErrorKind};
use std::path::Path;
use std::sync::Arc;

/// A unit of composable work: takes an input, eventually yields an output.
///
/// Stage workers, checkpoints and whole pipelines all implement this
/// contract, so they can be chained without knowing about each other.
///
/// Implementations require `In: Send + 'static` and `Out: Send + 'static`.
#[async_trait]
pub trait Runner<In, Out>: Send + Sync {
    /// Run against one input.
    async fn run(&self, input: In) -> GiottoResult<Out>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<In, Out, R> Runner<In, Out> for Arc<R>
where
    In: Send + 'static,
    Out: Send + 'static,
    R: Runner<In, Out> + ?Sized,
{
    async fn run(&self, input: In) -> GiottoResult<Out> {
        (**self).run(input).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<In, Out, R> Runner<In, Out> for Box<R>
where
    In: Send + 'static,
    Out: Send + 'static,
    R: Runner<In, Out> + ?Sized,
{
    async fn run(&self, input: In) -> GiottoResult<Out> {
        (**self).run(input).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Durable persistence of pipeline state.
///
/// One run is written by one process at a time; `save` is transactional so
/// a crash never leaves half a state behind.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Persist the run row and every job.
    async fn save(&self, state: &PipelineState) -> GiottoResult<()>;

    /// Load a run, or `None` if it was never saved.
    async fn load(&self, run_id: &str, base_dir: &Path) -> GiottoResult<Option<PipelineState>>;

    /// Job counts for a run, computed by the store.
    async fn progress(&self, run_id: &str) -> GiottoResult<Progress>;

    /// Ids of every saved run.
    async fn list_runs(&self) -> GiottoResult<Vec<String>>;
}

#[async_trait]
impl<S: PipelineStore + ?Sized> PipelineStore for Arc<S> {
    async fn save(&self, state: &PipelineState) -> GiottoResult<()> {
        (**self).save(state).await
    }

    async fn load(&self, run_id: &str, base_dir: &Path) -> GiottoResult<Option<PipelineState>> {
        (**self).load(run_id, base_dir).await
    }

    async fn progress(&self, run_id: &str) -> GiottoResult<Progress> {
        (**self).progress(run_id).await
    }

    async fn list_runs(&self) -> GiottoResult<Vec<String>> {
        (**self).list_runs().await
    }
}

/// Narrative producer: outlines the story and writes its chapters.
#[async_trait]
pub trait StoryProducer: Send + Sync {
    /// Produce the upstream story from the run inputs.
    async fn outline(&self, inputs: &StoryInputs) -> GiottoResult<Story>;

    /// Write one chapter of an outlined story.
    async fn write_chapter(
        &self,
        story: &Story,
        chapter: &ChapterOutline,
    ) -> GiottoResult<ChapterDraft>;

    /// Producer name (e.g., "outline-file", "gemini").
    fn producer_name(&self) -> &str;
}

#[async_trait]
impl<P: StoryProducer + ?Sized> StoryProducer for Arc<P> {
    async fn outline(&self, inputs: &StoryInputs) -> GiottoResult<Story> {
        (**self).outline(inputs).await
    }

    async fn write_chapter(
        &self,
        story: &Story,
        chapter: &ChapterOutline,
    ) -> GiottoResult<ChapterDraft> {
        (**self).write_chapter(story, chapter).await
    }

    fn producer_name(&self) -> &str {
        (**self).producer_name()
    }
}

/// Media generation provider: prompt in, bytes out.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Generate media for a prompt, optionally conditioned on a reference file.
    async fn generate(&self, prompt: &str, reference: Option<&Path>) -> GiottoResult<RawMedia>;

    /// Write generated media to `path`.
    ///
    /// The default writes the raw bytes unchanged.
    async fn render(&self, path: &Path, media: &RawMedia) -> GiottoResult<()> {
        tokio::fs::write(path, media.bytes()).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        tracing::debug!(path = %path.display(), bytes = media.bytes().len(), "Media rendered");
        Ok(())
    }

    /// Provider name (e.g., "replay", "imagen").
    fn provider_name(&self) -> &str;
}

#[async_trait]
impl<M: MediaProvider + ?Sized> MediaProvider for Arc<M> {
    async fn generate(&self, prompt: &str, reference: Option<&Path>) -> GiottoResult<RawMedia> {
        (**self).generate(prompt, reference).await
    }

    async fn render(&self, path: &Path, media: &RawMedia) -> GiottoResult<()> {
        (**self).render(path, media).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}

/// Throttle for calls against a shared external resource.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Wait until a call against `resource_key` is allowed.
    ///
    /// The returned permit holds any concurrency slot until dropped.
    async fn acquire(&self, resource_key: &str) -> GiottoResult<RatePermit>;
}
