//! Run layout against a real filesystem.

use giotto_core::{Job, JobStatus, JobType, PipelineState, RunLayout, output_exists};

#[test]
fn test_ensure_creates_every_stage_directory() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "r1");

    layout.ensure().unwrap();
    layout.ensure().unwrap();

    for job_type in JobType::ALL {
        assert!(layout.dir_for(job_type).is_dir(), "{} dir missing", job_type);
    }
    assert!(layout.audio().is_dir());
}

#[test]
fn test_empty_files_do_not_count_as_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "r1");
    layout.ensure().unwrap();

    let job = Job::new("r1", JobType::Image, "ch01_s01");
    let path = layout.output_path(&job);
    assert!(!output_exists(&path));

    std::fs::write(&path, b"").unwrap();
    assert!(!output_exists(&path));

    std::fs::write(&path, b"PNG").unwrap();
    assert!(output_exists(&path));
    assert!(!output_exists(layout.images()));
}

#[test]
fn test_interrupted_jobs_recover_as_pending_with_the_same_paths() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = PipelineState::new("r1", dir.path());
    let mut job = Job::new("r1", JobType::Plot, "ch01").with_metadata("chapter", "1");
    job.start();
    state.push_job(job.clone());

    let recovered = job.normalized();
    assert_eq!(*recovered.status(), JobStatus::Pending);
    assert!(recovered.output_ref().is_none());
    assert_eq!(
        state.layout().output_path(&recovered),
        RunLayout::new(dir.path(), "r1").path_for(JobType::Plot, "ch01")
    );
    assert!(state.chapters_generated().is_empty());
}
