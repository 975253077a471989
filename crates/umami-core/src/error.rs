use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during umami core operations.
#[derive(Debug, Error)]
pub enum UmamiError {
    /// An annotation does not index a valid substring of its text.
    #[error("invalid span ({start}, {end}, {label:?}) for text of {len} characters")]
    InvalidSpan {
        start: usize,
        end: usize,
        label: String,
        /// Length of the annotated text in characters.
        len: usize,
    },

    /// Two annotations of one example cover the same characters.
    #[error("overlapping spans ({first_start}, {first_end}) and ({second_start}, {second_end})")]
    OverlappingSpans {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },

    /// Training was requested without any examples.
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// A label is empty or carries leading or trailing whitespace.
    #[error("invalid label {0:?}: labels must be non-empty and trimmed")]
    InvalidLabel(String),

    /// An annotation uses a label that was never registered on the recognizer.
    #[error("label {0:?} is not registered on the entity recognizer")]
    UnknownLabel(String),

    /// A configuration value is outside its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No pipeline snapshot exists at the given path.
    #[error("no pipeline snapshot found at {}", .0.display())]
    SnapshotNotFound(PathBuf),

    /// The pipeline has no stage with this name.
    #[error("pipeline has no stage named {0:?}")]
    UnknownStage(String),

    /// A stage with this name is already part of the pipeline.
    #[error("pipeline already has a stage named {0:?}")]
    DuplicateStage(String),

    /// The snapshot on disk cannot be used by this build.
    #[error("incompatible snapshot: {0}")]
    IncompatibleSnapshot(String),

    /// Filesystem failure while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a snapshot file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    RegexError(#[from] regex::Error),

    /// Candle ML framework error.
    #[error("ML model error: {0}")]
    CandleError(String),
}

/// Coarse classification of [`UmamiError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed training data or configuration supplied by the caller.
    DataValidation,
    /// A snapshot or stage that was asked for does not exist.
    NotFound,
    /// Anything raised by the model, the filesystem or the serializer.
    Fault,
}

impl UmamiError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UmamiError::InvalidSpan { .. }
            | UmamiError::OverlappingSpans { .. }
            | UmamiError::EmptyTrainingSet
            | UmamiError::InvalidLabel(_)
            | UmamiError::UnknownLabel(_)
            | UmamiError::InvalidConfig(_) => ErrorKind::DataValidation,
            UmamiError::SnapshotNotFound(_) | UmamiError::UnknownStage(_) => ErrorKind::NotFound,
            UmamiError::DuplicateStage(_)
            | UmamiError::IncompatibleSnapshot(_)
            | UmamiError::Io(_)
            | UmamiError::Json(_)
            | UmamiError::RegexError(_)
            | UmamiError::CandleError(_) => ErrorKind::Fault,
        }
    }

    pub fn is_data_validation(&self) -> bool {
        self.kind() == ErrorKind::DataValidation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<candle_core::Error> for UmamiError {
    fn from(err: candle_core::Error) -> Self {
        UmamiError::CandleError(err.to_string())
    }
}

/// Result type alias for umami operations.
pub type Result<T> = std::result::Result<T, UmamiError>;
