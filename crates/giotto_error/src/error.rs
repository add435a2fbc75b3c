//! Top-level error wrapper types.

use crate::{
    ConfigError, DatabaseError, GenerationError, JsonError, PipelineError, PipelineErrorKind,
    StorageError,
};

/// Every failure the workspace can surface, discriminated by concern.
///
/// # Examples
///
/// ```
/// use giotto_error::{GiottoError, StorageError, StorageErrorKind};
///
/// let storage_err = StorageError::new(StorageErrorKind::FileRead("ch01.json".into()));
/// let err: GiottoError = storage_err.into();
/// assert!(format!("{}", err).contains("Storage Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum GiottoErrorKind {
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// File storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Durable store error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Collaborator error
    #[from(GenerationError)]
    Generation(GenerationError),
    /// Orchestration error
    #[from(PipelineError)]
    Pipeline(PipelineError),
}

/// Giotto error with kind discrimination.
///
/// # Examples
///
/// ```
/// use giotto_error::{GiottoResult, ConfigError};
///
/// fn might_fail() -> GiottoResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Giotto Error: {}", _0)]
pub struct GiottoError(Box<GiottoErrorKind>);

impl GiottoError {
    /// Create a new error from a kind.
    pub fn new(kind: GiottoErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &GiottoErrorKind {
        &self.0
    }

    /// Whether this error must abort the whole run rather than a single job.
    ///
    /// Persistence failures and upstream-artifact failures are run-level;
    /// everything else is captured on the job that raised it.
    pub fn is_run_fatal(&self) -> bool {
        match self.kind() {
            GiottoErrorKind::Database(_) => true,
            GiottoErrorKind::Pipeline(err) => matches!(
                err.kind,
                PipelineErrorKind::UpstreamArtifact { .. } | PipelineErrorKind::MissingAsset { .. }
            ),
            _ => false,
        }
    }

    /// Whether a retry wrapper should attempt the failed operation again.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            GiottoErrorKind::Generation(err) => err.kind.is_retryable(),
            _ => false,
        }
    }
}

// Generic From implementation for any type that converts to GiottoErrorKind
impl<T> From<T> for GiottoError
where
    T: Into<GiottoErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

impl crate::RetryableError for GiottoError {
    fn is_retryable(&self) -> bool {
        GiottoError::is_retryable(self)
    }
}

/// Result type for Giotto operations.
pub type GiottoResult<T> = std::result::Result<T, GiottoError>;
