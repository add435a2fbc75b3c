//! Chapter draft and manifest encoding errors.

use std::path::Path;

/// A chapter draft, chapter manifest or status report failed to encode or
/// decode.
///
/// A producer draft that fails to decode fails only its own plot job.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("JSON Error: {} at line {} in {}", message, line, file)]
pub struct JsonError {
    /// serde_json's message, prefixed with the draft or job it concerns
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl JsonError {
    /// Encoding failure not tied to a file.
    ///
    /// ```
    /// use giotto_error::JsonError;
    ///
    /// let err = JsonError::new("r1:post_production:ch02: missing field `panels`");
    /// assert!(err.to_string().starts_with("JSON Error: r1:post_production:ch02"));
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

    /// Draft or manifest at `path` could not be decoded.
    ///
    /// ```
    /// use giotto_error::JsonError;
    ///
    /// let err = JsonError::in_file("drafts/ch03.json", "expected value at line 1 column 1");
    /// assert_eq!(err.message, "drafts/ch03.json: expected value at line 1 column 1");
    /// ```
    #[track_caller]
    pub fn in_file(path: impl AsRef<Path>, reason: impl std::fmt::Display) -> Self {
        Self::new(format!("{}: {}", path.as_ref().display(), reason))
    }
}
