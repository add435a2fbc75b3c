//! Trait definitions for the Giotto generation pipeline.
//!
//! This crate defines the seams of the system: the [`Runner`] contract stages
//! are composed from, the [`PipelineStore`] persistence contract, and the
//! external collaborators ([`StoryProducer`], [`MediaProvider`],
//! [`RateLimit`]) the pipeline calls out to.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;
mod types;

pub use traits::{MediaProvider, PipelineStore, RateLimit, Runner, StoryProducer};
pub use types::{RatePermit, RawMedia};
