use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for group-by operations.
///
/// Variants are grouped by the taxonomy the operator reports against:
/// configuration problems stop the operator before any row is read, spill
/// I/O failures abort the current run, and data errors come from the
/// typed-value layer while aggregating.
#[derive(Error, Debug)]
pub enum GroupByError {
    // === Configuration Errors ===
    /// A group-key field is not present in the input row layout.
    #[error("group field not found in input: {name}")]
    GroupFieldNotFound { name: String },

    /// An aggregate's subject field is not present in the input row layout.
    #[error("subject field '{name}' of aggregate '{aggregate}' not found in input")]
    SubjectFieldNotFound { name: String, aggregate: String },

    /// An aggregate other than `COUNT_ANY` was configured without a subject.
    #[error("aggregate '{aggregate}' requires a subject field")]
    MissingSubject { aggregate: String },

    /// Unrecognised aggregate type code.
    #[error("unknown aggregate type: {code}")]
    UnknownAggregateType { code: String },

    /// Percentile argument outside its accepted range.
    #[error("invalid percentile for aggregate '{aggregate}': {value}")]
    InvalidPercentile { aggregate: String, value: String },

    /// Any other structurally invalid configuration.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    // === I/O Errors ===
    /// Plain I/O error without a known spill path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The spill file (or its directory) could not be created.
    #[error("unable to create temporary spill file in '{path}': {source}")]
    SpillCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a row to the spill file failed.
    #[error("unable to write row to spill file '{path}': {source}")]
    SpillWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a row back from the spill file failed.
    #[error("unable to read row from spill file '{path}': {source}")]
    SpillRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The spill file contained bytes the row codec could not decode.
    #[error("spill file '{path}' is corrupt: {detail}")]
    SpillCorrupt { path: PathBuf, detail: String },

    // === Data Errors ===
    /// A value could not be converted to the type an aggregate needs.
    #[error("cannot convert {value} to {target}")]
    TypeConversion { value: String, target: String },

    /// Integer overflow while summing.
    #[error("integer overflow")]
    IntegerOverflow,

    // === Control ===
    /// The run was stopped by an external cancellation request.
    #[error("group by cancelled")]
    Cancelled,

    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`GroupByError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid setup; reported once before processing starts.
    Configuration,
    /// Spill file or other filesystem failure.
    Io,
    /// Bad input data reported by the typed-value layer.
    Data,
    /// External stop request.
    Cancelled,
    /// Bug.
    Internal,
}

impl GroupByError {
    /// Map this error to its category.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::GroupFieldNotFound { .. }
            | Self::SubjectFieldNotFound { .. }
            | Self::MissingSubject { .. }
            | Self::UnknownAggregateType { .. }
            | Self::InvalidPercentile { .. }
            | Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::Io(_)
            | Self::SpillCreate { .. }
            | Self::SpillWrite { .. }
            | Self::SpillRead { .. }
            | Self::SpillCorrupt { .. } => ErrorCategory::Io,
            Self::TypeConversion { .. } | Self::IntegerOverflow => ErrorCategory::Data,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }

    /// Create a type-conversion error.
    pub fn conversion(value: impl Into<String>, target: impl Into<String>) -> Self {
        Self::TypeConversion {
            value: value.into(),
            target: target.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `GroupByError`.
pub type Result<T> = std::result::Result<T, GroupByError>;
