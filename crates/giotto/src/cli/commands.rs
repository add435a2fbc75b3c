//! CLI command definitions.

use clap::{Parser, Subcommand};
use giotto::HaltPoint;
use std::path::PathBuf;

/// Giotto - resumable story-to-panels generation with durable checkpoints
#[derive(Parser, Debug)]
#[command(name = "giotto")]
#[command(about = "Resumable story-to-panels generation with durable checkpoints", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the bundled defaults
    #[arg(long, global = true, env = "GIOTTO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a run, or continue it if the run id already exists
    Generate {
        /// Run identifier
        run_id: String,

        /// Story outline TOML file
        #[arg(long)]
        outline: PathBuf,

        /// Number of chapters to outline (0 takes every chapter in the file)
        #[arg(long, default_value = "0")]
        chapters: u32,

        /// Premise recorded with the run
        #[arg(long, default_value = "")]
        premise: String,

        /// Style hint appended to media prompts
        #[arg(long)]
        style: Option<String>,

        /// Directory of prewritten chapter drafts (chNN.json)
        #[arg(long)]
        drafts: Option<PathBuf>,

        /// Directory holding portrait.png, panel.png and clip.mp4
        #[arg(long)]
        fixtures: PathBuf,

        /// Stop after "story" or a stage name, overriding the configuration
        #[arg(long)]
        halt_after: Option<HaltPoint>,
    },

    /// Continue an existing run, retrying failed jobs
    Resume {
        /// Run identifier
        run_id: String,

        /// Story outline TOML file
        #[arg(long)]
        outline: PathBuf,

        /// Directory of prewritten chapter drafts (chNN.json)
        #[arg(long)]
        drafts: Option<PathBuf>,

        /// Directory holding portrait.png, panel.png and clip.mp4
        #[arg(long)]
        fixtures: PathBuf,
    },

    /// Show job counts for a run
    Status {
        /// Run identifier
        run_id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known runs
    Runs,
}
