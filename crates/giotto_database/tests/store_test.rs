//! Tests for the SQLite pipeline store.

use giotto_core::{
    ChapterOutline, HaltPoint, Job, JobStatus, JobType, PipelineState, Story, StoryInputs,
};
use giotto_database::SqliteStore;
use giotto_interface::PipelineStore;
use std::path::Path;

fn open(dir: &Path) -> SqliteStore {
    SqliteStore::open(dir.join("db/giotto.db")).unwrap()
}

fn chapter_job(n: u32) -> Job {
    Job::new("r1", JobType::Plot, giotto_core::chapter_key(n)).with_metadata("chapter", n.to_string())
}

fn sample_state(base: &Path) -> PipelineState {
    let mut state = PipelineState::new("r1", base);
    state.set_story(Some(
        Story::builder()
            .title("The Keeper")
            .premise("A lighthouse keeper finds a map")
            .chapters(vec![ChapterOutline::new(1, "Fog", "The map arrives")])
            .build()
            .unwrap(),
    ));
    state.set_inputs(Some(
        StoryInputs::new("A lighthouse keeper finds a map", 1).with_style(Some("ink".to_string())),
    ));
    for n in 1..=3 {
        state.push_job(chapter_job(n));
    }
    state
}

#[tokio::test]
async fn test_load_missing_run_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    assert!(store.load("nope", dir.path()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_then_load_round_trips_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let mut state = sample_state(dir.path());
    state.job_mut("r1:plot:ch01").unwrap().complete("/out/ch01.json");
    state.job_mut("r1:plot:ch02").unwrap().fail("provider 503");
    state.set_halted_at(Some(HaltPoint::AfterStory));
    store.save(&state).await.unwrap();

    let loaded = store.load("r1", dir.path()).await.unwrap().unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded.layout(), state.layout());
}

#[tokio::test]
async fn test_jobs_load_in_creation_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let mut state = PipelineState::new("r1", dir.path());
    for n in [5, 1, 3, 2, 4] {
        state.push_job(chapter_job(n));
    }
    store.save(&state).await.unwrap();

    let loaded = store.load("r1", dir.path()).await.unwrap().unwrap();
    let ids: Vec<&str> = loaded.jobs().iter().map(|j| j.id().as_str()).collect();
    assert_eq!(
        ids,
        ["r1:plot:ch05", "r1:plot:ch01", "r1:plot:ch03", "r1:plot:ch02", "r1:plot:ch04"]
    );
}

#[tokio::test]
async fn test_in_progress_jobs_reload_as_pending() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let mut state = sample_state(dir.path());
    state.job_mut("r1:plot:ch01").unwrap().start();
    store.save(&state).await.unwrap();

    let loaded = store.load("r1", dir.path()).await.unwrap().unwrap();
    assert_eq!(*loaded.job("r1:plot:ch01").unwrap().status(), JobStatus::Pending);
}

#[tokio::test]
async fn test_upsert_clears_error_and_keeps_stage_flags() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let mut state = sample_state(dir.path());
    state.job_mut("r1:plot:ch02").unwrap().fail("timeout");
    store.save(&state).await.unwrap();

    for n in 1..=3 {
        state
            .job_mut(&format!("r1:plot:ch0{}", n))
            .unwrap()
            .complete(format!("/out/ch0{}.json", n));
    }
    assert!(state.mark_stage_complete(JobType::Plot));
    store.save(&state).await.unwrap();

    let loaded = store.load("r1", dir.path()).await.unwrap().unwrap();
    let job = loaded.job("r1:plot:ch02").unwrap();
    assert_eq!(*job.status(), JobStatus::Completed);
    assert!(job.error().is_none());
    assert_eq!(*job.retry_count(), 1);
    assert!(loaded.is_stage_complete(JobType::Plot));
    assert!(!loaded.is_stage_complete(JobType::Character));
}

#[tokio::test]
async fn test_progress_counts_by_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let mut state = sample_state(dir.path());
    state.push_job(chapter_job(4));
    state.job_mut("r1:plot:ch01").unwrap().complete("/a");
    state.job_mut("r1:plot:ch02").unwrap().fail("boom");
    state.job_mut("r1:plot:ch03").unwrap().skip("gave up");
    store.save(&state).await.unwrap();

    let progress = store.progress("r1").await.unwrap();
    assert_eq!(*progress.total(), 4);
    assert_eq!(*progress.completed(), 1);
    assert_eq!(*progress.failed(), 1);
    assert_eq!(*progress.skipped(), 1);
    assert_eq!(*progress.pending(), 1);
    assert_eq!(*progress.percent(), 50.0);
    assert_eq!(progress, state.progress());
}

#[tokio::test]
async fn test_list_runs_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path());
        store.save(&PipelineState::new("r1", dir.path())).await.unwrap();
        store.save(&PipelineState::new("r2", dir.path())).await.unwrap();
    }

    let store = open(dir.path());
    assert_eq!(store.list_runs().await.unwrap(), ["r1", "r2"]);
    assert_eq!(*store.progress("r2").await.unwrap().total(), 0);
}
