//! Diesel models for the pipeline tables.

use diesel::prelude::*;

/// Database row for the jobs table.
///
/// Used for both reads and upserts; `None` fields are written as `NULL` so
/// a cleared error or output really clears.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = crate::schema::jobs)]
#[diesel(primary_key(id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRow {
    pub id: String,
    pub run_id: String,
    pub job_type: String,
    pub status: String,
    pub correlation: Option<String>,
    pub metadata: String,
    pub error: Option<String>,
    pub output_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub position: i32,
}

/// Database row for the pipeline_states table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = crate::schema::pipeline_states)]
#[diesel(primary_key(run_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PipelineStateRow {
    pub run_id: String,
    pub plot_complete: bool,
    pub character_complete: bool,
    pub image_complete: bool,
    pub video_complete: bool,
    pub post_production_complete: bool,
    pub upstream_artifact: Option<String>,
    pub story_inputs: Option<String>,
    pub halted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
