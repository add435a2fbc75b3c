//! Command handlers.

use giotto::{
    GiottoConfig, GiottoResult, HaltPoint, JobType, PipelineError, PipelineErrorKind,
    PipelineState, PipelineStore, StoryInputs, build_replay_orchestrator, open_store,
    outline_producer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// Arguments of `giotto generate`.
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    /// Run identifier
    pub run_id: String,
    /// Story outline file
    pub outline: PathBuf,
    /// Chapters to outline
    pub chapters: u32,
    /// Premise recorded with the run
    pub premise: String,
    /// Media style hint
    pub style: Option<String>,
    /// Prewritten drafts directory
    pub drafts: Option<PathBuf>,
    /// Replay fixtures directory
    pub fixtures: PathBuf,
    /// Halt override
    pub halt_after: Option<HaltPoint>,
}

/// Start a run, or continue it when the run id is already known.
#[instrument(skip_all, fields(run_id = %args.run_id))]
pub async fn generate(config: GiottoConfig, args: GenerateArgs) -> GiottoResult<()> {
    let config = match args.halt_after {
        Some(halt) => config.with_halt_after(Some(halt)),
        None => config,
    };

    let store = open_store(&config)?;
    let producer = Arc::new(outline_producer(&config, &args.outline, args.drafts)?);
    let orchestrator = build_replay_orchestrator(&config, store, producer, &args.fixtures);

    let inputs = StoryInputs::new(args.premise, args.chapters).with_style(args.style);
    let state = orchestrator.generate(&args.run_id, inputs).await?;
    report(&state);
    Ok(())
}

/// Continue a saved run from its first incomplete stage.
#[instrument(skip(config, outline, drafts, fixtures))]
pub async fn resume(
    config: GiottoConfig,
    run_id: &str,
    outline: PathBuf,
    drafts: Option<PathBuf>,
    fixtures: PathBuf,
) -> GiottoResult<()> {
    let store = open_store(&config)?;
    let producer = Arc::new(outline_producer(&config, &outline, drafts)?);
    let orchestrator = build_replay_orchestrator(&config, store, producer, &fixtures);

    let state = orchestrator.resume(run_id).await?;
    report(&state);
    Ok(())
}

/// Print job counts for a run.
#[instrument(skip(config))]
pub async fn status(config: GiottoConfig, run_id: &str, json: bool) -> GiottoResult<()> {
    let store = open_store(&config)?;
    let state = store
        .load(run_id, config.base_dir())
        .await?
        .ok_or_else(|| PipelineError::new(PipelineErrorKind::RunNotFound(run_id.to_string())))?;
    let progress = store.progress(run_id).await?;

    let stages: Vec<String> = JobType::ALL
        .into_iter()
        .filter(|stage| state.is_stage_complete(*stage))
        .map(|stage| stage.to_string())
        .collect();

    if json {
        let value = serde_json::json!({
            "run_id": run_id,
            "progress": progress,
            "stages_complete": stages,
            "chapters_generated": state.chapters_generated(),
            "halted_at": state.halted_at().map(|h| h.to_string()),
        });
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| giotto::JsonError::new(e.to_string()))?;
        println!("{}", text);
    } else {
        println!("Run: {}", run_id);
        println!("Progress: {}", progress);
        println!("Stages complete: {}", stages.join(", "));
        if let Some(halt) = state.halted_at() {
            println!("Halted after: {}", halt);
        }
    }
    Ok(())
}

/// Print every known run id.
#[instrument(skip(config))]
pub async fn list_runs(config: GiottoConfig) -> GiottoResult<()> {
    let store = open_store(&config)?;
    let runs = store.list_runs().await?;
    if runs.is_empty() {
        println!("No runs found");
    }
    for run in runs {
        println!("{}", run);
    }
    Ok(())
}

fn report(state: &PipelineState) {
    let progress = state.progress();
    info!(
        run_id = %state.run_id(),
        complete = state.is_complete(),
        halted_at = ?state.halted_at(),
        "Run finished"
    );
    println!("Run: {}", state.run_id());
    println!("Progress: {}", progress);
    match (state.halted_at(), state.first_incomplete_stage()) {
        (Some(halt), _) => println!("Halted after: {} (continue with `giotto resume`)", halt),
        (None, None) => println!("All stages complete"),
        (None, Some(stage)) => println!(
            "Stopped at stage '{}' with {} failed job(s); run `giotto resume` to retry",
            stage,
            progress.failed()
        ),
    }
}
