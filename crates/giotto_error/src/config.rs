//! Configuration and outline errors.

use std::path::Path;

/// A `giotto.toml` layer, an outline file or the logging setup was rejected.
///
/// Raised while loading, before any run state is touched.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// What was rejected, prefixed with the offending file when known
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Rejected setting or outline entry.
    ///
    /// ```
    /// use giotto_error::ConfigError;
    ///
    /// let err = ConfigError::new("concurrency.image must be at least 1");
    /// assert!(err.to_string().starts_with("Configuration Error: concurrency.image"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Rejected contents of the config layer or outline at `path`.
    ///
    /// ```
    /// use giotto_error::ConfigError;
    ///
    /// let err = ConfigError::in_file("runs/giotto.toml", "unknown field `halt`");
    /// assert_eq!(err.message, "runs/giotto.toml: unknown field `halt`");
    /// ```
    #[track_caller]
    pub fn in_file(path: impl AsRef<Path>, reason: impl std::fmt::Display) -> Self {
        Self::new(format!("{}: {}", path.as_ref().display(), reason))
    }
}
