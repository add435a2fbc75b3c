//! Error types for the Giotto pipeline.
//!
//! This crate provides the foundation error types used throughout the Giotto workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Errors fall into four families that the orchestrator treats differently:
//!
//! - [`GenerationError`]: a collaborator failed for one job. Recorded on the
//!   job, never aborts sibling jobs.
//! - [`DatabaseError`]: the durable store failed. Fatal for the invocation.
//! - [`PipelineErrorKind::UpstreamArtifact`]: the story itself could not be
//!   produced. Fatal for the run.
//! - [`PipelineErrorKind::MissingAsset`]: a later stage found an earlier
//!   output missing. An invariant violation, never retried.
//!
//! # Examples
//!
//! ```
//! use giotto_error::{GiottoResult, StorageError, StorageErrorKind};
//!
//! fn read_panel() -> GiottoResult<Vec<u8>> {
//!     Err(StorageError::new(StorageErrorKind::NotFound("panel.png".into())))?
//! }
//!
//! assert!(read_panel().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod generation;
mod json;
mod pipeline;
mod storage;

pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{GiottoError, GiottoErrorKind, GiottoResult};
pub use generation::{GenerationError, GenerationErrorKind, RetryableError};
pub use json::JsonError;
pub use pipeline::{PipelineError, PipelineErrorKind};
pub use storage::{StorageError, StorageErrorKind};
