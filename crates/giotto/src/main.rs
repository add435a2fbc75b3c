//! Giotto CLI binary.
//!
//! This binary provides command-line access to Giotto's functionality:
//! - Start or continue a run from a story outline
//! - Resume an interrupted or partially failed run
//! - Inspect run progress

use clap::Parser;
use giotto::GiottoConfig;
use giotto::telemetry::{LogFormat, init_telemetry};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, GenerateArgs, generate, list_runs, resume, status};

    // Load .env before clap reads GIOTTO_CONFIG
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_telemetry(format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => GiottoConfig::from_file(path)?,
        None => GiottoConfig::load()?,
    };

    match cli.command {
        Commands::Generate {
            run_id,
            outline,
            chapters,
            premise,
            style,
            drafts,
            fixtures,
            halt_after,
        } => {
            let args = GenerateArgs {
                run_id,
                outline,
                chapters,
                premise,
                style,
                drafts,
                fixtures,
                halt_after,
            };
            generate(config, args).await?;
        }

        Commands::Resume {
            run_id,
            outline,
            drafts,
            fixtures,
        } => {
            resume(config, &run_id, outline, drafts, fixtures).await?;
        }

        Commands::Status { run_id, json } => {
            status(config, &run_id, json).await?;
        }

        Commands::Runs => {
            list_runs(config).await?;
        }
    }

    Ok(())
}
