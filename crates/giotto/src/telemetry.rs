//! Tracing subscriber setup for the CLI.

use giotto_error::{ConfigError, GiottoResult};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `info` is used, or `debug` for the
/// giotto crates when `verbose` is set.
pub fn init_telemetry(format: LogFormat, verbose: bool) -> GiottoResult<()> {
    let fallback = if verbose {
        "info,giotto=debug,giotto_pipeline=debug,giotto_database=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    result.map_err(|e| ConfigError::new(format!("Failed to initialize logging: {}", e)))?;
    Ok(())
}
