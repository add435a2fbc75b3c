//! Application configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Bundled defaults (`giotto.toml` at the workspace root)
//! 2. `~/.config/giotto/giotto.toml`
//! 3. `./giotto.toml`
//!
//! User files are optional and silently skipped when absent.

use config::{Config, File, FileFormat};
use derive_getters::Getters;
use giotto_cache::ResponseCacheConfig;
use giotto_core::HaltPoint;
use giotto_database::ConnectionOptions;
use giotto_error::{ConfigError, GiottoError, GiottoResult};
use giotto_pipeline::{OrchestratorConfig, StageConcurrency};
use giotto_rate_limit::{RateLimitConfig, ResourceLimit, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../giotto.toml");

/// Top-level Giotto configuration.
///
/// # Example
///
/// ```
/// use giotto::GiottoConfig;
/// use giotto_core::JobType;
///
/// let config = GiottoConfig::from_toml_str(r#"
///     base_dir = "/data/runs"
///     halt_after = "plot"
///
///     [concurrency]
///     plot = 5
/// "#).unwrap();
///
/// assert_eq!(config.concurrency().for_stage(JobType::Plot), 5);
/// assert_eq!(config.concurrency().for_stage(JobType::Image), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct GiottoConfig {
    /// Root under which each run gets a directory
    #[serde(default = "default_base_dir")]
    base_dir: PathBuf,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    database_path: PathBuf,

    /// Milliseconds a writer waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    busy_timeout_ms: u64,

    /// Failed attempts tolerated per job
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    /// Optional stopping point
    #[serde(default)]
    halt_after: Option<HaltPoint>,

    /// Jobs in flight per stage
    #[serde(default)]
    concurrency: StageConcurrency,

    /// Media response cache
    #[serde(default)]
    cache: ResponseCacheConfig,

    /// Limits per provider
    #[serde(default)]
    rate_limits: BTreeMap<String, ResourceLimit>,

    /// Backoff for transient provider failures
    #[serde(default)]
    retry: RetryPolicy,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("giotto-runs")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("giotto-runs/giotto.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    giotto_core::DEFAULT_MAX_RETRIES
}

impl Default for GiottoConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_retries: default_max_retries(),
            halt_after: None,
            concurrency: StageConcurrency::default(),
            cache: ResponseCacheConfig::default(),
            rate_limits: BTreeMap::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl GiottoConfig {
    /// Load with precedence: current dir > home dir > bundled defaults.
    #[instrument]
    pub fn load() -> GiottoResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/giotto/giotto.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("giotto").required(false));

        let config = builder.build().map_err(|e| {
            GiottoError::from(ConfigError::new(format!(
                "Failed to build configuration: {}",
                e
            )))
        })?;
        Self::deserialize_from(config)
    }

    /// Bundled defaults overlaid with one explicit file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> GiottoResult<Self> {
        debug!("Loading configuration from file");

        let config = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                GiottoError::from(ConfigError::in_file(path.as_ref(), e))
            })?;
        Self::deserialize_from(config)
    }

    /// Parse configuration from TOML text, without the bundled defaults.
    pub fn from_toml_str(toml: &str) -> GiottoResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| {
                GiottoError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        Self::deserialize_from(config)
    }

    fn deserialize_from(config: Config) -> GiottoResult<Self> {
        config.try_deserialize().map_err(|e| {
            GiottoError::from(ConfigError::new(format!(
                "Failed to parse configuration: {}",
                e
            )))
        })
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::builder()
            .base_dir(self.base_dir.clone())
            .halt_after(self.halt_after)
            .max_retries(self.max_retries)
            .build()
            .unwrap_or_else(|_| OrchestratorConfig::new(self.base_dir.clone()))
    }

    /// Pool options derived from this configuration.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::default().with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    /// Rate limit settings derived from this configuration.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.rate_limits.clone(), self.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giotto_core::JobType;

    #[test]
    fn bundled_defaults_parse() {
        let config = GiottoConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(*config.max_retries(), 3);
        assert_eq!(config.concurrency().for_stage(JobType::Plot), 3);
        assert!(config.halt_after().is_none());
        assert!(config.rate_limits().contains_key("outline-file"));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = GiottoConfig::from_toml_str("").unwrap();
        assert_eq!(config, GiottoConfig::default());
    }

    #[test]
    fn halt_after_accepts_stage_names() {
        let config = GiottoConfig::from_toml_str(r#"halt_after = "image""#).unwrap();
        assert_eq!(
            *config.halt_after(),
            Some(HaltPoint::AfterStage(JobType::Image))
        );
        assert_eq!(
            *config.orchestrator_config().halt_after(),
            Some(HaltPoint::AfterStage(JobType::Image))
        );
    }

    #[test]
    fn unknown_halt_point_is_rejected() {
        let err = GiottoConfig::from_toml_str(r#"halt_after = "lunch""#).unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration"));
    }
}
