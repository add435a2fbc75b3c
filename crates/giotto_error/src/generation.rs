//! Collaborator (narrative and media provider) error types and retry classification.

/// Failure conditions reported by generation collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GenerationErrorKind {
    /// Provider request failed with an HTTP-like status code
    #[display("Provider returned {}: {}", status_code, message)]
    Provider {
        /// Status code reported by the provider
        status_code: u16,
        /// Provider message
        message: String,
    },
    /// Provider is throttling us
    #[display("Rate limited by provider: {}", _0)]
    RateLimited(String),
    /// Provider did not answer in time
    #[display("Provider timed out: {}", _0)]
    Timeout(String),
    /// Provider answered but the content was unusable
    #[display("Invalid response: {}", _0)]
    InvalidResponse(String),
    /// Provider refused the prompt
    #[display("Prompt rejected: {}", _0)]
    Rejected(String),
    /// Rendering the response to disk failed
    #[display("Render failed: {}", _0)]
    Render(String),
    /// Produced output was empty
    #[display("Empty output at {}", _0)]
    EmptyOutput(String),
}

impl GenerationErrorKind {
    /// Check if this error type should be retried by the collaborator's own retry budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationErrorKind::Provider { status_code, .. } => {
                matches!(*status_code, 408 | 429 | 500 | 502 | 503 | 504)
            }
            GenerationErrorKind::RateLimited(_) => true,
            GenerationErrorKind::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Collaborator error with source location tracking.
///
/// # Examples
///
/// ```
/// use giotto_error::{GenerationError, GenerationErrorKind};
///
/// let err = GenerationError::new(GenerationErrorKind::Timeout("image backend".into()));
/// assert!(err.kind.is_retryable());
/// assert!(format!("{}", err).contains("timed out"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of error that occurred
    pub kind: GenerationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new GenerationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Trait for errors that support retry logic.
///
/// Lets retry wrappers decide between a transient and a permanent failure
/// without knowing the concrete error type.
pub trait RetryableError {
    /// Whether the operation that produced this error should be attempted again.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for GenerationError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
