//! Resumable stage execution for the Giotto pipeline.
//!
//! A run turns [`StoryInputs`](giotto_core::StoryInputs) into a story, then
//! walks five stages in order: plot, character, image, video and
//! post-production. Every stage is expanded into jobs, checkpointed, executed
//! with bounded concurrency and checkpointed again, so an interrupted or
//! partially failed run resumes exactly where it stopped.
//!
//! # Example
//!
//! ```no_run
//! use giotto_core::{JobType, StoryInputs};
//! use giotto_database::SqliteStore;
//! use giotto_pipeline::{
//!     AssemblyHandler, ChapterHandler, Orchestrator, OrchestratorConfig, OutlineFileProducer,
//!     ReplayStageWorker, StageWorker,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> giotto_error::GiottoResult<()> {
//! let store = Arc::new(SqliteStore::open("giotto.db")?);
//! let producer = Arc::new(OutlineFileProducer::from_file("outline.toml")?);
//!
//! let orchestrator = Orchestrator::new(store, Arc::clone(&producer), OrchestratorConfig::new("runs"))
//!     .with_stage(JobType::Plot, StageWorker::new(ChapterHandler::new(producer)).with_concurrency(3))
//!     .with_stage(JobType::Character, ReplayStageWorker::new(JobType::Character, "fixtures/portrait.png"))
//!     .with_stage(JobType::Image, ReplayStageWorker::new(JobType::Image, "fixtures/panel.png"))
//!     .with_stage(JobType::Video, ReplayStageWorker::new(JobType::Video, "fixtures/clip.mp4"))
//!     .with_stage(JobType::PostProduction, StageWorker::new(AssemblyHandler::new()));
//!
//! let state = orchestrator.generate("r1", StoryInputs::new("A keeper finds a map", 7)).await?;
//! println!("{}", state.progress());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod checkpoint;
mod config;
mod expansion;
pub mod handlers;
mod orchestrator;
mod outline;
mod runner;
mod worker;

pub use batch::{BatchExecutor, BatchOutcome, BatchResult};
pub use checkpoint::{CheckpointRunner, ExpandRunner};
pub use config::{OrchestratorConfig, OrchestratorConfigBuilder, StageConcurrency};
pub use expansion::expand_stage;
pub use handlers::{
    AssemblyHandler, ChapterHandler, ChapterManifest, JobHandler, MediaHandler, StageContext,
};
pub use orchestrator::Orchestrator;
pub use outline::OutlineFileProducer;
pub use runner::{FnRunner, Pipeline};
pub use worker::{ReplayStageWorker, StageWorker};
