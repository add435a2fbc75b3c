//! Conversions between domain types and database rows.

use crate::{DatabaseResult, JobRow, PipelineStateRow};
use chrono::{DateTime, SecondsFormat, Utc};
use giotto_core::{HaltPoint, Job, JobStatus, JobType, PipelineState};
use giotto_error::{DatabaseError, DatabaseErrorKind};
use std::collections::BTreeMap;
use std::path::Path;

/// Format a timestamp for storage. Nanosecond precision keeps round trips exact.
pub fn timestamp_to_string(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp.
pub fn string_to_timestamp(s: &str) -> DatabaseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("Invalid timestamp '{}': {}", s, e)))
}

fn corrupt(message: String) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::CorruptRow(message))
}

/// Convert a Job to its row. `position` is the job's index in the run.
pub fn job_to_row(job: &Job, run_id: &str, position: usize) -> DatabaseResult<JobRow> {
    Ok(JobRow {
        id: job.id().clone(),
        run_id: run_id.to_string(),
        job_type: job.job_type().to_string(),
        status: job.status().to_string(),
        correlation: job.correlation().clone(),
        metadata: serde_json::to_string(job.metadata())?,
        error: job.error().clone(),
        output_ref: job.output_ref().clone(),
        created_at: timestamp_to_string(job.created_at()),
        updated_at: timestamp_to_string(job.updated_at()),
        retry_count: *job.retry_count() as i32,
        max_retries: *job.max_retries() as i32,
        position: position as i32,
    })
}

/// Convert a row back to a Job, repairing interrupted or inconsistent rows.
pub fn row_to_job(row: JobRow) -> DatabaseResult<Job> {
    let job_type: JobType = row
        .job_type
        .parse()
        .map_err(|_| corrupt(format!("Invalid job type '{}' on {}", row.job_type, row.id)))?;
    let status: JobStatus = row
        .status
        .parse()
        .map_err(|_| corrupt(format!("Invalid job status '{}' on {}", row.status, row.id)))?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&row.metadata)?;

    let job = Job::builder()
        .id(row.id)
        .job_type(job_type)
        .status(status)
        .correlation(row.correlation)
        .metadata(metadata)
        .error(row.error)
        .output_ref(row.output_ref)
        .retry_count(row.retry_count.max(0) as u32)
        .max_retries(row.max_retries.max(0) as u32)
        .created_at(string_to_timestamp(&row.created_at)?)
        .updated_at(string_to_timestamp(&row.updated_at)?)
        .build()
        .map_err(|e| corrupt(e.to_string()))?;

    Ok(job.normalized())
}

/// Convert PipelineState to its row.
pub fn state_to_row(state: &PipelineState) -> DatabaseResult<PipelineStateRow> {
    let upstream_artifact = state.story().as_ref().map(serde_json::to_string).transpose()?;
    let story_inputs = state.inputs().as_ref().map(serde_json::to_string).transpose()?;

    Ok(PipelineStateRow {
        run_id: state.run_id().clone(),
        plot_complete: state.is_stage_complete(JobType::Plot),
        character_complete: state.is_stage_complete(JobType::Character),
        image_complete: state.is_stage_complete(JobType::Image),
        video_complete: state.is_stage_complete(JobType::Video),
        post_production_complete: state.is_stage_complete(JobType::PostProduction),
        upstream_artifact,
        story_inputs,
        halted_at: state.halted_at().as_ref().map(HaltPoint::to_string),
        created_at: timestamp_to_string(state.created_at()),
        updated_at: timestamp_to_string(state.updated_at()),
    })
}

/// Rebuild PipelineState from its row and job rows (already in run order).
pub fn row_to_state(
    row: PipelineStateRow,
    job_rows: Vec<JobRow>,
    base_dir: &Path,
) -> DatabaseResult<PipelineState> {
    let mut state = PipelineState::new(row.run_id.clone(), base_dir);

    for job_row in job_rows {
        state.push_job(row_to_job(job_row)?);
    }

    state.restore_stage_flags([
        (JobType::Plot, row.plot_complete),
        (JobType::Character, row.character_complete),
        (JobType::Image, row.image_complete),
        (JobType::Video, row.video_complete),
        (JobType::PostProduction, row.post_production_complete),
    ]);

    let story = row
        .upstream_artifact
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    let inputs = row
        .story_inputs
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    let halted_at = row
        .halted_at
        .as_deref()
        .map(|h| h.parse::<HaltPoint>())
        .transpose()
        .map_err(|e| corrupt(e.to_string()))?;

    state.set_story(story);
    state.set_inputs(inputs);
    state.set_halted_at(halted_at);

    Ok(state.with_timestamps(
        string_to_timestamp(&row.created_at)?,
        string_to_timestamp(&row.updated_at)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_rows_load_as_pending() {
        let mut job = Job::new("r1", JobType::Image, "ch01_s01");
        job.start();
        let row = job_to_row(&job, "r1", 0).unwrap();
        assert_eq!(row.status, "in_progress");
        assert_eq!(*row_to_job(row).unwrap().status(), JobStatus::Pending);
    }

    #[test]
    fn unknown_status_is_a_corrupt_row() {
        let job = Job::new("r1", JobType::Plot, "ch01");
        let mut row = job_to_row(&job, "r1", 0).unwrap();
        row.status = "exploded".into();
        let err = row_to_job(row).unwrap_err();
        assert!(matches!(err.kind, DatabaseErrorKind::CorruptRow(_)));
    }

    #[test]
    fn timestamps_round_trip_exactly() {
        let now = Utc::now();
        assert_eq!(string_to_timestamp(&timestamp_to_string(&now)).unwrap(), now);
    }
}
