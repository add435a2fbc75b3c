//! Giotto - resumable story-to-panels generation
//!
//! Giotto turns a premise into a story outline, then walks five stages:
//! chapter drafts, character portraits, scene panels, scene clips and
//! chapter assembly. Every stage is checkpointed to SQLite, so a run that
//! was interrupted or partially failed resumes where it stopped, and
//! outputs already on disk are never generated twice.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use giotto::{GiottoConfig, StoryInputs, build_replay_orchestrator, open_store, outline_producer};
//! use std::sync::Arc;
//!
//! # async fn example() -> giotto::GiottoResult<()> {
//! let config = GiottoConfig::load()?;
//! let store = open_store(&config)?;
//! let producer = Arc::new(outline_producer(&config, "outline.toml", None)?);
//!
//! let orchestrator = build_replay_orchestrator(&config, store, producer, "fixtures");
//! let state = orchestrator
//!     .generate("lighthouse", StoryInputs::new("A keeper finds a map", 7))
//!     .await?;
//! println!("{}", state.progress());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Giotto is organized as a workspace with focused crates:
//!
//! - `giotto_error` - Error types
//! - `giotto_core` - Jobs, run state, story types and output layout
//! - `giotto_interface` - Collaborator and store traits
//! - `giotto_cache` - Response cache for media generation
//! - `giotto_rate_limit` - Per-provider limits and retry with backoff
//! - `giotto_database` - SQLite persistence
//! - `giotto_pipeline` - Stage workers and the orchestrator
//!
//! This crate (`giotto`) re-exports everything for convenience and adds
//! configuration loading, logging setup and the `giotto` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod app;
mod config;
pub mod telemetry;

pub use app::{
    CLIP_FIXTURE, GiottoOrchestrator, PANEL_FIXTURE, PORTRAIT_FIXTURE, build_orchestrator,
    build_replay_orchestrator, open_store, outline_producer,
};
pub use config::GiottoConfig;

pub use giotto_cache::*;
pub use giotto_core::*;
pub use giotto_database::{ConnectionOptions, SqliteStore};
pub use giotto_error::*;
pub use giotto_interface::*;
pub use giotto_pipeline::{
    AssemblyHandler, BatchExecutor, BatchOutcome, BatchResult, ChapterHandler, ChapterManifest,
    JobHandler, MediaHandler, Orchestrator, OrchestratorConfig, OutlineFileProducer,
    ReplayStageWorker, StageConcurrency, StageWorker,
};
pub use giotto_rate_limit::*;
