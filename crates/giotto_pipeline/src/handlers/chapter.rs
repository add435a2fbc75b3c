use super::{JobHandler, StageContext, write_atomic};
use async_trait::async_trait;
use giotto_core::{Job, JobType};
use giotto_error::{GiottoResult, JsonError, PipelineError, PipelineErrorKind};
use giotto_interface::StoryProducer;
use std::path::Path;
use tracing::{debug, instrument};

/// Plot stage handler: writes one chapter draft as JSON.
pub struct ChapterHandler<P> {
    producer: P,
    resource_key: String,
}

impl<P: StoryProducer> ChapterHandler<P> {
    /// Handler rate limited under the producer's name.
    pub fn new(producer: P) -> Self {
        let resource_key = producer.producer_name().to_string();
        Self {
            producer,
            resource_key,
        }
    }

    /// Override the rate limit key.
    pub fn with_resource_key(mut self, key: impl Into<String>) -> Self {
        self.resource_key = key.into();
        self
    }
}

#[async_trait]
impl<P: StoryProducer + 'static> JobHandler for ChapterHandler<P> {
    fn job_type(&self) -> JobType {
        JobType::Plot
    }

    fn resource_key(&self) -> &str {
        &self.resource_key
    }

    #[instrument(skip_all, fields(job_id = %job.id()))]
    async fn handle(&self, job: &Job, ctx: &StageContext, output: &Path) -> GiottoResult<()> {
        let story = ctx.require_story()?;
        let outline = job
            .meta("chapter")
            .and_then(|c| c.parse::<u32>().ok())
            .and_then(|n| story.chapter(n))
            .ok_or_else(|| {
                PipelineError::new(PipelineErrorKind::InvalidTag {
                    field: "chapter",
                    value: job.meta("chapter").unwrap_or_default().to_string(),
                })
            })?;

        let draft = self.producer.write_chapter(story, outline).await?;
        let json = serde_json::to_vec_pretty(&draft)
            .map_err(|e| JsonError::new(format!("chapter {}: {}", outline.number(), e)))?;
        write_atomic(output, &json).await?;

        debug!(chapter = outline.number(), scenes = draft.scenes().len(), "Chapter written");
        Ok(())
    }
}
