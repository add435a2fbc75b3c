//! End-to-end runs through the configured orchestrator builders.

mod test_utils;

use giotto::{
    ChapterManifest, HaltPoint, JobStatus, JobType, PipelineStore, StoryInputs,
    build_orchestrator, build_replay_orchestrator, open_store, outline_producer,
};
use std::sync::Arc;
use test_utils::{EchoMedia, OUTLINE_JOBS, config, write_fixtures, write_outline};

fn read_manifest(path: &std::path::Path) -> ChapterManifest {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_replay_run_assembles_every_chapter() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outline = write_outline(dir.path());
    let fixtures = write_fixtures(dir.path());

    let store = open_store(&config).unwrap();
    let producer = Arc::new(outline_producer(&config, &outline, None).unwrap());
    let orchestrator =
        build_replay_orchestrator(&config, Arc::clone(&store), producer, &fixtures);

    let state = orchestrator
        .generate("keeper", StoryInputs::new("ignored", 0))
        .await
        .unwrap();

    assert!(state.is_complete());
    assert_eq!(state.jobs().len(), OUTLINE_JOBS);
    assert_eq!(state.chapters_generated().into_iter().collect::<Vec<_>>(), vec![1, 2]);

    let output = dir.path().join("runs/keeper/output");
    let first = read_manifest(&output.join("ch01_final.json"));
    assert_eq!(first.title(), "Fog");
    assert_eq!(first.panels().len(), 2);
    assert_eq!(first.clips().len(), 2);
    let second = read_manifest(&output.join("ch02_final.json"));
    assert_eq!(second.panels().len(), 1);

    let panel = std::fs::read(dir.path().join("runs/keeper/images/ch01_s02.png")).unwrap();
    assert_eq!(panel, b"panel");

    let progress = store.progress("keeper").await.unwrap();
    assert_eq!(*progress.completed(), OUTLINE_JOBS);
    assert_eq!(store.list_runs().await.unwrap(), vec!["keeper".to_string()]);
}

#[tokio::test]
async fn test_missing_fixture_stops_at_stage_until_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outline = write_outline(dir.path());
    let fixtures = write_fixtures(dir.path());
    std::fs::remove_file(fixtures.join(giotto::CLIP_FIXTURE)).unwrap();

    let store = open_store(&config).unwrap();
    let producer = Arc::new(outline_producer(&config, &outline, None).unwrap());
    let orchestrator = build_replay_orchestrator(&config, store, producer, &fixtures);

    let state = orchestrator
        .generate("keeper", StoryInputs::new("", 0))
        .await
        .unwrap();
    assert_eq!(state.first_incomplete_stage(), Some(JobType::Video));
    assert!(
        state
            .jobs_of(JobType::Video)
            .all(|j| *j.status() == JobStatus::Failed)
    );
    assert!(!state.has_jobs(JobType::PostProduction));

    std::fs::write(fixtures.join(giotto::CLIP_FIXTURE), b"clip").unwrap();
    let state = orchestrator.resume("keeper").await.unwrap();

    assert!(state.is_complete());
    assert_eq!(state.jobs().len(), OUTLINE_JOBS);
    assert!(
        state
            .jobs_of(JobType::Video)
            .all(|j| *j.status() == JobStatus::Completed && *j.retry_count() == 1)
    );
}

#[tokio::test]
async fn test_halt_from_config_then_resume_with_fresh_process() {
    let dir = tempfile::tempdir().unwrap();
    let outline = write_outline(dir.path());
    let fixtures = write_fixtures(dir.path());

    let halting = config(dir.path()).with_halt_after(Some(HaltPoint::AfterStage(JobType::Image)));
    {
        let store = open_store(&halting).unwrap();
        let producer = Arc::new(outline_producer(&halting, &outline, None).unwrap());
        let orchestrator = build_replay_orchestrator(&halting, store, producer, &fixtures);
        let state = orchestrator
            .generate("keeper", StoryInputs::new("", 0))
            .await
            .unwrap();
        assert_eq!(*state.halted_at(), Some(HaltPoint::AfterStage(JobType::Image)));
        assert!(state.is_stage_complete(JobType::Image));
        assert!(!state.has_jobs(JobType::Video));
    }

    let plain = config(dir.path());
    let store = open_store(&plain).unwrap();
    let producer = Arc::new(outline_producer(&plain, &outline, None).unwrap());
    let orchestrator = build_replay_orchestrator(&plain, store, producer, &fixtures);
    let state = orchestrator.resume("keeper").await.unwrap();

    assert!(state.halted_at().is_none());
    assert!(state.is_complete());
}

#[tokio::test]
async fn test_media_provider_is_not_called_again_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outline = write_outline(dir.path());
    let media = EchoMedia::new();

    let store = open_store(&config).unwrap();
    let producer = Arc::new(outline_producer(&config, &outline, None).unwrap());
    let orchestrator = build_orchestrator(&config, store, producer, Arc::clone(&media));

    let state = orchestrator
        .generate("keeper", StoryInputs::new("", 0))
        .await
        .unwrap();
    assert!(state.is_complete());
    // 1 portrait, 3 panels, 3 clips
    assert_eq!(media.calls(), 7);

    let again = orchestrator.resume("keeper").await.unwrap();
    assert!(again.is_complete());
    assert_eq!(media.calls(), 7);
    assert_eq!(again.progress(), state.progress());
}

#[tokio::test]
async fn test_resume_unknown_run_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outline = write_outline(dir.path());

    let store = open_store(&config).unwrap();
    let producer = Arc::new(outline_producer(&config, &outline, None).unwrap());
    let orchestrator = build_replay_orchestrator(&config, store, producer, dir.path());

    let err = orchestrator.resume("nobody").await.unwrap_err();
    assert!(err.to_string().contains("nobody"));
}
