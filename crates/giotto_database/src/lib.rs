//! SQLite persistence for Giotto pipeline state.
//!
//! [`SqliteStore`] implements [`giotto_interface::PipelineStore`] on top of
//! diesel with an r2d2 connection pool. The schema is created by embedded
//! migrations the first time a database is opened.
//!
//! Tables:
//!
//! - `pipeline_states`: one row per run (stage flags, story, inputs, halt)
//! - `jobs`: one row per job, keyed by the deterministic job id

#![forbid(unsafe_code)]

mod connection;
mod conversions;
mod models;
mod store;

/// Diesel table definitions.
pub mod schema;

pub use connection::{
    ConnectionOptions, SqlitePool, SqlitePooledConnection, establish_pool, run_migrations,
};
pub use conversions::{job_to_row, row_to_job, row_to_state, state_to_row};
pub use models::{JobRow, PipelineStateRow};
pub use store::SqliteStore;

use giotto_error::DatabaseError;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
