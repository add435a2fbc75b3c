//! Core data model for the Giotto generation pipeline.
//!
//! A run is described by a [`PipelineState`]: the upstream [`Story`], one
//! [`Job`] per unit of work, and a completion flag per [`JobType`]. Outputs
//! live under a [`RunLayout`] derived only from the base directory and run
//! id, which is what lets a restarted process pick up where the last one
//! stopped.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod job;
mod layout;
mod progress;
mod state;
mod story;

pub use job::{DEFAULT_MAX_RETRIES, Job, JobBuilder, JobStatus, JobType};
pub use layout::{RunLayout, output_exists};
pub use progress::Progress;
pub use state::{HaltPoint, PipelineState};
pub use story::{
    ChapterDraft, ChapterOutline, CharacterSheet, Scene, Story, StoryBuilder, StoryInputs,
    chapter_key, scene_key, slug,
};
