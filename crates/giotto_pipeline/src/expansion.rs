//! Turning the upstream story and earlier outputs into the jobs of a stage.
//!
//! Expansion is deterministic: job ids are derived from the run id, the
//! stage and a correlation key, so expanding twice yields the same jobs.
//! A stage is expanded at most once and never after it completed.

use giotto_core::{
    ChapterDraft, Job, JobStatus, JobType, PipelineState, Story, chapter_key, scene_key,
};
use giotto_error::{GiottoResult, JsonError, PipelineError, PipelineErrorKind};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Create the jobs of `job_type` and add them to the state.
///
/// Returns the number of jobs added. Nothing is added when the stage is
/// already complete or already has jobs.
///
/// # Errors
///
/// - `StageOrder` when the previous stage is not complete.
/// - `UpstreamArtifact` when the run has no story.
/// - `MissingAsset` when a completed chapter's draft is gone from disk.
#[instrument(skip(state), fields(run_id = %state.run_id()))]
pub fn expand_stage(
    state: &mut PipelineState,
    job_type: JobType,
    max_retries: u32,
) -> GiottoResult<usize> {
    if state.is_stage_complete(job_type) || state.has_jobs(job_type) {
        debug!("Stage already expanded");
        return Ok(0);
    }
    if let Some(previous) = job_type.previous().filter(|p| !state.is_stage_complete(*p)) {
        return Err(PipelineError::new(PipelineErrorKind::StageOrder {
            stage: job_type.to_string(),
            requires: previous.to_string(),
        })
        .into());
    }
    let story = state.story().clone().ok_or_else(|| {
        PipelineError::new(PipelineErrorKind::UpstreamArtifact {
            run_id: state.run_id().clone(),
            message: "story has not been produced".to_string(),
        })
    })?;

    let jobs = match job_type {
        JobType::Plot => plot_jobs(state, &story),
        JobType::Character => character_jobs(state, &story),
        JobType::Image => image_jobs(state)?,
        JobType::Video => video_jobs(state),
        JobType::PostProduction => assembly_jobs(state)?,
    };

    let mut added = 0;
    let mut duplicates = 0;
    for job in jobs {
        let id = job.id().clone();
        if state.push_job(job.with_max_retries(max_retries)) {
            added += 1;
        } else {
            duplicates += 1;
            warn!(job_id = %id, "Duplicate job key, job dropped");
        }
    }
    info!(added, duplicates, "Expanded stage");
    Ok(added)
}

fn style_suffix(state: &PipelineState) -> String {
    state
        .inputs()
        .as_ref()
        .and_then(|i| i.style().clone())
        .map(|s| format!(" Style: {}.", s))
        .unwrap_or_default()
}

fn plot_jobs(state: &PipelineState, story: &Story) -> Vec<Job> {
    story
        .chapters()
        .iter()
        .map(|chapter| {
            Job::new(state.run_id(), JobType::Plot, chapter.key())
                .with_metadata("chapter", chapter.number().to_string())
                .with_metadata("title", chapter.title().clone())
        })
        .collect()
}

/// Unique correlation keys for the cast, in story order.
///
/// Names that slug to the same key ("Mara Vance", "Mara-Vance") get a
/// numeric suffix so every character keeps its own portrait.
fn character_keys(story: &Story) -> Vec<String> {
    let mut used = BTreeSet::new();
    story
        .characters()
        .iter()
        .map(|character| {
            let base = match character.slug() {
                s if s.is_empty() => "character".to_string(),
                s => s,
            };
            let mut key = base.clone();
            let mut n = 2;
            while !used.insert(key.clone()) {
                key = format!("{}-{}", base, n);
                n += 1;
            }
            if key != base {
                warn!(
                    name = %character.name(),
                    key = %key,
                    "Character slug collides, using suffixed key"
                );
            }
            key
        })
        .collect()
}

fn character_jobs(state: &PipelineState, story: &Story) -> Vec<Job> {
    let style = style_suffix(state);
    story
        .characters()
        .iter()
        .zip(character_keys(story))
        .map(|(character, key)| {
            Job::new(state.run_id(), JobType::Character, key)
                .with_metadata("name", character.name().clone())
                .with_metadata(
                    "prompt",
                    format!(
                        "Reference portrait of {}. {}{}",
                        character.name(),
                        character.description(),
                        style
                    ),
                )
        })
        .collect()
}

fn completed(state: &PipelineState, job_type: JobType) -> impl Iterator<Item = &Job> {
    state
        .jobs_of(job_type)
        .filter(|j| *j.status() == JobStatus::Completed)
}

fn read_draft(job: &Job) -> GiottoResult<ChapterDraft> {
    let path = job.output_ref().clone().unwrap_or_default();
    let raw = std::fs::read(Path::new(&path)).map_err(|_| {
        PipelineError::new(PipelineErrorKind::MissingAsset {
            job_id: job.id().clone(),
            path: path.clone(),
        })
    })?;
    Ok(serde_json::from_slice(&raw).map_err(|e| JsonError::in_file(&path, e))?)
}

fn portrait_of(state: &PipelineState, name: &str) -> Option<String> {
    completed(state, JobType::Character)
        .find(|j| j.meta("name") == Some(name))
        .and_then(|j| j.output_ref().clone())
}

/// Chapter number recorded on the plot job when it was expanded.
///
/// A draft may carry a different number (hand-written drafts are used
/// verbatim); the plot job's number is the one every later key hangs off.
fn plot_chapter(plot: &Job, draft: &ChapterDraft) -> u32 {
    match plot.meta("chapter").and_then(|c| c.parse().ok()) {
        Some(number) => {
            if number != *draft.number() {
                warn!(
                    job_id = %plot.id(),
                    draft_number = *draft.number(),
                    chapter = number,
                    "Draft number differs from its chapter, using the chapter"
                );
            }
            number
        }
        None => *draft.number(),
    }
}

fn image_jobs(state: &PipelineState) -> GiottoResult<Vec<Job>> {
    let style = style_suffix(state);
    let mut jobs = Vec::new();
    for plot in completed(state, JobType::Plot) {
        let draft = read_draft(plot)?;
        let chapter = plot_chapter(plot, &draft);
        for (scene, position) in draft.scenes().iter().zip(1u32..) {
            let cast = if scene.characters().is_empty() {
                String::new()
            } else {
                format!(" Featuring {}.", scene.characters().join(", "))
            };
            let mut job = Job::new(state.run_id(), JobType::Image, scene_key(chapter, position))
                .with_metadata("chapter", chapter.to_string())
                .with_metadata("scene", position.to_string())
                .with_metadata(
                    "prompt",
                    format!("{}{}{}", scene.description(), cast, style),
                );
            if let Some(portrait) = scene
                .characters()
                .first()
                .and_then(|name| portrait_of(state, name))
            {
                job = job.with_metadata("reference", portrait);
            }
            jobs.push(job);
        }
    }
    Ok(jobs)
}

fn video_jobs(state: &PipelineState) -> Vec<Job> {
    completed(state, JobType::Image)
        .filter_map(|image| {
            let correlation = image.correlation().clone()?;
            let panel = image.output_ref().clone()?;
            let mut job = Job::new(state.run_id(), JobType::Video, correlation)
                .with_metadata("reference", panel)
                .with_metadata(
                    "prompt",
                    format!("Animate: {}", image.meta("prompt").unwrap_or_default()),
                );
            for key in ["chapter", "scene"] {
                if let Some(value) = image.meta(key) {
                    job = job.with_metadata(key, value);
                }
            }
            Some(job)
        })
        .collect()
}

fn outputs_for_chapter(state: &PipelineState, job_type: JobType, chapter: &str) -> Vec<String> {
    completed(state, job_type)
        .filter(|j| j.meta("chapter") == Some(chapter))
        .filter_map(|j| j.output_ref().clone())
        .collect()
}

fn assembly_jobs(state: &PipelineState) -> GiottoResult<Vec<Job>> {
    let mut jobs = Vec::new();
    for plot in completed(state, JobType::Plot) {
        let draft = read_draft(plot)?;
        let number = plot_chapter(plot, &draft);
        let chapter = number.to_string();
        let panels = outputs_for_chapter(state, JobType::Image, &chapter);
        let clips = outputs_for_chapter(state, JobType::Video, &chapter);
        let encode = |list: &[String]| {
            serde_json::to_string(list).map_err(|e| JsonError::new(e.to_string()))
        };

        jobs.push(
            Job::new(
                state.run_id(),
                JobType::PostProduction,
                chapter_key(number),
            )
            .with_metadata("chapter", chapter.clone())
            .with_metadata("title", draft.title().clone())
            .with_metadata("text", draft.text().clone())
            .with_metadata("panels", encode(&panels)?)
            .with_metadata("clips", encode(&clips)?),
        );
    }
    Ok(jobs)
}
