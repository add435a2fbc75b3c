//! Pipeline (orchestration) error types.

/// Run-level error conditions raised by the orchestrator and its stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PipelineErrorKind {
    /// The upstream story could not be produced; nothing can be expanded into jobs
    #[display("Upstream artifact for run '{}' could not be produced: {}", run_id, message)]
    UpstreamArtifact {
        /// Run identifier
        run_id: String,
        /// Underlying failure
        message: String,
    },
    /// A stage expected an output from an earlier stage that is absent
    #[display("Missing asset for job '{}': {}", job_id, path)]
    MissingAsset {
        /// Job that referenced the asset
        job_id: String,
        /// Path that was expected to exist
        path: String,
    },
    /// No persisted state exists for the run
    #[display("Run '{}' not found", _0)]
    RunNotFound(String),
    /// A stage was asked to expand before its predecessor completed
    #[display("Stage '{}' cannot start before '{}' is complete", stage, requires)]
    StageOrder {
        /// Stage being expanded
        stage: String,
        /// Predecessor that is still incomplete
        requires: String,
    },
    /// A batch task panicked or was cancelled
    #[display("Task {} panicked: {}", index, message)]
    TaskPanicked {
        /// Index of the task in its batch
        index: usize,
        /// Panic payload or join error
        message: String,
    },
    /// A job referenced by id is not part of the run
    #[display("Job '{}' not found in run", _0)]
    JobNotFound(String),
    /// No stage runner was registered for a stage
    #[display("No worker registered for stage '{}'", _0)]
    MissingWorker(String),
    /// A persisted tag could not be parsed
    #[display("Invalid value '{}' for {}", value, field)]
    InvalidTag {
        /// Field being parsed
        field: &'static str,
        /// Offending value
        value: String,
    },
}

/// Pipeline error with source location tracking.
///
/// # Examples
///
/// ```
/// use giotto_error::{PipelineError, PipelineErrorKind};
///
/// let err = PipelineError::new(PipelineErrorKind::RunNotFound("r1".into()));
/// assert!(format!("{}", err).contains("r1"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The specific error condition
    pub kind: PipelineErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl PipelineError {
    /// Create a new PipelineError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
