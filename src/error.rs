//! Error types for forge-recall operations.
//!
//! The variants mirror the lifecycle of a recall test: dataset resolution,
//! engine training, population, search, and the post-add count invariant.
//! Stage failures keep the engine's own error as their source so callers can
//! walk the chain with [`std::error::Error::source`].

use std::io;
use thiserror::Error;

/// Result type alias using [`RecallError`].
pub type Result<T> = std::result::Result<T, RecallError>;

/// Errors that can occur while preparing, running, or validating recall tests.
#[derive(Error, Debug)]
pub enum RecallError {
    /// A named dataset could not be found under the testdata root.
    #[error("dataset unavailable: {name} ({reason})")]
    DatasetUnavailable {
        /// Dataset name as requested by the configuration.
        name: String,
        /// Why the dataset could not be resolved.
        reason: String,
    },

    /// The engine rejected training because the sample is too small.
    #[error("insufficient training data: required {required} vectors, got {actual}")]
    InsufficientTrainingData {
        /// Minimum number of training vectors the engine needs.
        required: usize,
        /// Number of training vectors supplied.
        actual: usize,
    },

    /// Any other engine error raised while training.
    #[error("training failed")]
    TrainingFailure(#[source] Box<RecallError>),

    /// The engine reported success from `train` but is still untrained.
    #[error("engine reports untrained state after train()")]
    NotTrained,

    /// Any engine error raised while adding vectors.
    #[error("add failed")]
    AddFailure(#[source] Box<RecallError>),

    /// Any engine error raised while searching.
    #[error("search failed at query {query}")]
    SearchFailure {
        /// Zero-based query index that failed.
        query: usize,
        /// Engine error.
        #[source]
        source: Box<RecallError>,
    },

    /// The engine holds a different number of vectors than were added.
    #[error("count mismatch: expected {expected} vectors in index, got {actual}")]
    CountMismatch {
        /// Number of vectors added.
        expected: u64,
        /// Number the engine reports.
        actual: u64,
    },

    /// A cache record was malformed or stale. Only ever logged; a corrupt
    /// record is reported to callers as a cache miss.
    #[error("cache record corrupted: {0}")]
    CacheCorruption(String),

    /// Vector dimensions do not match the expected dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected vector dimension.
        expected: usize,
        /// Actual vector dimension provided.
        actual: usize,
    },

    /// Invalid parameter value provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A dataset file has an invalid or unrecognized layout.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during serialization or deserialization.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RecallError {
    /// Creates a new `DatasetUnavailable` error.
    pub fn dataset_unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DatasetUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InsufficientTrainingData` error.
    pub fn insufficient_training_data(required: usize, actual: usize) -> Self {
        Self::InsufficientTrainingData { required, actual }
    }

    /// Creates a new `DimensionMismatch` error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a new `InvalidFormat` error.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Wraps an engine error raised by `train`.
    ///
    /// `InsufficientTrainingData` passes through unwrapped so the orchestrator
    /// can apply its skip policy.
    pub fn training(err: RecallError) -> Self {
        match err {
            e @ Self::InsufficientTrainingData { .. } => e,
            e => Self::TrainingFailure(Box::new(e)),
        }
    }

    /// Wraps an engine error raised by `add`.
    pub fn add(err: RecallError) -> Self {
        Self::AddFailure(Box::new(err))
    }

    /// Wraps an engine error raised by `search`.
    pub fn search(query: usize, err: RecallError) -> Self {
        Self::SearchFailure {
            query,
            source: Box::new(err),
        }
    }

    /// True when the error is a too-small training sample.
    pub fn is_insufficient_training_data(&self) -> bool {
        matches!(self, Self::InsufficientTrainingData { .. })
    }

    /// True when the error means a named dataset is missing locally.
    pub fn is_dataset_unavailable(&self) -> bool {
        matches!(self, Self::DatasetUnavailable { .. })
    }
}

impl From<serde_json::Error> for RecallError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
