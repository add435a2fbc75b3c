//! End-to-end orchestration tests against a real SQLite store.

mod test_utils;

use giotto_core::{HaltPoint, JobStatus, JobType, StoryInputs};
use giotto_interface::PipelineStore;
use giotto_pipeline::{OrchestratorConfig, ReplayStageWorker};
use std::collections::BTreeSet;
use std::sync::Arc;
use test_utils::{FakeMedia, FakeProducer, base_dir, open_store, orchestrator};

fn inputs(chapters: u32) -> StoryInputs {
    StoryInputs::new("A lighthouse keeper finds a map", chapters)
}

#[tokio::test]
async fn test_failed_chapter_recovers_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    let media = FakeMedia::new();
    producer.fail_chapter(4);

    let orch = orchestrator(
        Arc::clone(&store),
        Arc::clone(&producer),
        Arc::clone(&media),
        OrchestratorConfig::new(base_dir(dir.path())),
    );

    let state = orch.generate("r1", inputs(7)).await.unwrap();
    assert_eq!(
        state.chapters_generated(),
        BTreeSet::from([1, 2, 3, 5, 6, 7])
    );
    let ch4 = state.job("r1:plot:ch04").unwrap();
    assert_eq!(*ch4.status(), JobStatus::Failed);
    assert!(ch4.error().as_ref().unwrap().contains("unavailable"));
    assert!(!state.is_stage_complete(JobType::Plot));
    assert!(!state.has_jobs(JobType::Image));
    assert_eq!(media.calls(), 0);

    producer.heal_chapter(4);
    let state = orch.resume("r1").await.unwrap();

    assert_eq!(state.chapters_generated(), (1..=7).collect::<BTreeSet<u32>>());
    for n in [1, 2, 3, 5, 6, 7] {
        assert_eq!(producer.chapter_calls(n), 1, "chapter {} rewritten", n);
    }
    assert_eq!(producer.chapter_calls(4), 2);
    assert_eq!(producer.outline_calls(), 1);
    assert!(state.is_complete());

    // one portrait, seven panels, seven clips
    assert_eq!(media.calls(), 15);
    assert_eq!(state.jobs_of(JobType::PostProduction).count(), 7);
    let manifest = state.layout().path_for(JobType::PostProduction, "ch04");
    assert!(giotto_core::output_exists(&manifest));
}

#[tokio::test]
async fn test_resume_of_finished_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    let media = FakeMedia::new();
    let orch = orchestrator(
        Arc::clone(&store),
        Arc::clone(&producer),
        Arc::clone(&media),
        OrchestratorConfig::new(base_dir(dir.path())),
    );

    orch.generate("r1", inputs(3)).await.unwrap();
    let calls = (producer.total_chapter_calls(), media.calls());

    let first = orch.resume("r1").await.unwrap();
    let second = orch.resume("r1").await.unwrap();

    assert_eq!(first, second);
    assert!(second.is_complete());
    assert_eq!((producer.total_chapter_calls(), media.calls()), calls);
}

#[tokio::test]
async fn test_existing_output_skips_the_collaborator() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    let config = OrchestratorConfig::builder()
        .base_dir(base_dir(dir.path()))
        .halt_after(Some(HaltPoint::AfterStage(JobType::Plot)))
        .build()
        .unwrap();
    let orch = orchestrator(Arc::clone(&store), Arc::clone(&producer), FakeMedia::new(), config);

    let layout = giotto_core::RunLayout::new(base_dir(dir.path()), "r1");
    layout.ensure().unwrap();
    let existing = layout.path_for(JobType::Plot, "ch02");
    let draft = giotto_core::ChapterDraft::new(2, "Chapter 2", "Kept from an earlier run", vec![]);
    std::fs::write(&existing, serde_json::to_vec(&draft).unwrap()).unwrap();

    let state = orch.generate("r1", inputs(3)).await.unwrap();

    assert_eq!(producer.chapter_calls(2), 0);
    assert_eq!(producer.chapter_calls(1), 1);
    let job = state.job("r1:plot:ch02").unwrap();
    assert_eq!(*job.status(), JobStatus::Completed);
    assert_eq!(
        job.output_ref().as_deref(),
        Some(&*existing.to_string_lossy())
    );
    assert_eq!(
        *state.halted_at(),
        Some(HaltPoint::AfterStage(JobType::Plot))
    );
}

#[tokio::test]
async fn test_progress_never_decreases_across_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    producer.fail_chapter(2);
    producer.fail_chapter(3);
    let orch = orchestrator(
        Arc::clone(&store),
        Arc::clone(&producer),
        FakeMedia::new(),
        OrchestratorConfig::new(base_dir(dir.path())),
    );

    orch.generate("r1", inputs(4)).await.unwrap();
    let before = orch.status("r1").await.unwrap();

    producer.heal_chapter(2);
    orch.resume("r1").await.unwrap();
    let middle = orch.status("r1").await.unwrap();

    producer.heal_chapter(3);
    orch.resume("r1").await.unwrap();
    let after = orch.status("r1").await.unwrap();

    assert!(middle.completed() >= before.completed());
    assert!(after.completed() >= middle.completed());
    assert_eq!(*after.failed(), 0);
    assert_eq!(*after.percent(), 100.0);
}

#[tokio::test]
async fn test_jobs_exhausting_retries_are_skipped_and_stage_moves_on() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    producer.fail_chapter(2);
    let config = OrchestratorConfig::builder()
        .base_dir(base_dir(dir.path()))
        .max_retries(2u32)
        .build()
        .unwrap();
    let orch = orchestrator(Arc::clone(&store), Arc::clone(&producer), FakeMedia::new(), config);

    orch.generate("r1", inputs(2)).await.unwrap();
    let state = orch.resume("r1").await.unwrap();

    let ch2 = state.job("r1:plot:ch02").unwrap();
    assert_eq!(*ch2.status(), JobStatus::Skipped);
    assert_eq!(*ch2.retry_count(), 2);
    assert!(state.is_stage_complete(JobType::Plot));
    assert!(state.is_complete());
    // skipped chapters get neither panels nor a manifest
    assert!(state.job("r1:image:ch02_s01").is_none());
    assert!(state.job("r1:post_production:ch02").is_none());
}

#[tokio::test]
async fn test_halt_after_story_then_resume() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    let config = OrchestratorConfig::builder()
        .base_dir(base_dir(dir.path()))
        .halt_after(Some(HaltPoint::AfterStory))
        .build()
        .unwrap();
    let orch = orchestrator(Arc::clone(&store), Arc::clone(&producer), FakeMedia::new(), config);

    let state = orch.generate("r1", inputs(2)).await.unwrap();
    assert_eq!(*state.halted_at(), Some(HaltPoint::AfterStory));
    assert!(state.story().is_some());
    assert!(state.jobs().is_empty());

    // generating again does not move a halted run
    let again = orch.generate("r1", inputs(2)).await.unwrap();
    assert!(again.jobs().is_empty());

    let state = orch.resume("r1").await.unwrap();
    assert!(state.halted_at().is_none());
    assert!(state.is_complete());
    assert_eq!(producer.outline_calls(), 1);
}

#[tokio::test]
async fn test_outline_failure_is_fatal_and_retried_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    producer.set_outline_fails(true);
    let orch = orchestrator(
        Arc::clone(&store),
        Arc::clone(&producer),
        FakeMedia::new(),
        OrchestratorConfig::new(base_dir(dir.path())),
    );

    let err = orch.generate("r1", inputs(2)).await.unwrap_err();
    assert!(err.is_run_fatal());
    assert!(err.to_string().contains("could not be produced"));

    let saved = store.load("r1", &base_dir(dir.path())).await.unwrap().unwrap();
    assert!(saved.story().is_none());
    assert!(saved.inputs().is_some());

    producer.set_outline_fails(false);
    let state = orch.resume("r1").await.unwrap();
    assert!(state.is_complete());
    assert_eq!(producer.outline_calls(), 2);
}

#[tokio::test]
async fn test_resume_unknown_run_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        open_store(dir.path()),
        FakeProducer::new(),
        FakeMedia::new(),
        OrchestratorConfig::new(base_dir(dir.path())),
    );

    let err = orch.resume("ghost").await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_replay_workers_fill_media_stages() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("panel.png");
    std::fs::write(&fixture, b"PNG").unwrap();

    let store = open_store(dir.path());
    let producer = FakeProducer::new();
    let orch = giotto_pipeline::Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&producer),
        OrchestratorConfig::new(base_dir(dir.path())),
    )
    .with_stage(
        JobType::Plot,
        giotto_pipeline::StageWorker::new(giotto_pipeline::ChapterHandler::new(Arc::clone(
            &producer,
        ))),
    )
    .with_stage(JobType::Character, ReplayStageWorker::new(JobType::Character, &fixture))
    .with_stage(JobType::Image, ReplayStageWorker::new(JobType::Image, &fixture))
    .with_stage(JobType::Video, ReplayStageWorker::new(JobType::Video, &fixture))
    .with_stage(
        JobType::PostProduction,
        giotto_pipeline::StageWorker::new(giotto_pipeline::AssemblyHandler::new()),
    );

    let state = orch.generate("r1", inputs(2)).await.unwrap();
    assert!(state.is_complete());

    let clip = state.job("r1:video:ch01_s01").unwrap();
    let path = clip.output_ref().clone().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"PNG");
}

#[tokio::test]
async fn test_missing_stage_worker_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let producer = FakeProducer::new();
    let orch = giotto_pipeline::Orchestrator::new(
        open_store(dir.path()),
        Arc::clone(&producer),
        OrchestratorConfig::new(base_dir(dir.path())),
    );

    let err = orch.generate("r1", inputs(1)).await.unwrap_err();
    assert!(err.to_string().contains("No worker registered"));
}

#[tokio::test]
async fn test_registered_stage_is_wrapped_in_expand_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        open_store(dir.path()),
        FakeProducer::new(),
        FakeMedia::new(),
        OrchestratorConfig::new(base_dir(dir.path())),
    );

    assert_eq!(
        orch.describe_stage(JobType::Plot).unwrap(),
        "expand:plot -> checkpoint:plot:expanded -> stage:plot -> checkpoint:plot:ran"
    );

    let bare = giotto_pipeline::Orchestrator::new(
        open_store(dir.path()),
        FakeProducer::new(),
        OrchestratorConfig::new(base_dir(dir.path())),
    );
    assert!(bare.describe_stage(JobType::Video).is_none());
}
