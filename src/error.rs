//! Error types for the champion registry
//!
//! Every failure the registry reports carries a typed kind so that callers
//! (operators promoting a model, clients of the prediction server) can tell
//! "model not ready" apart from "bad request".

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Champion registry error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment (or other named entity) is absent from the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Run id is unknown to the store
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Metric was already logged for this run (metrics are write-once)
    #[error("Duplicate metric '{metric}' for run {run_id}: metrics are write-once")]
    DuplicateMetric {
        /// Run the metric was logged against
        run_id: String,
        /// Metric name
        metric: String,
    },

    /// Selection found nothing eligible to promote
    #[error("No candidates in experiment '{experiment}' ranked by '{metric}'\nTrain candidates before selecting a champion.")]
    NoCandidates {
        /// Experiment name
        experiment: String,
        /// Ranking metric
        metric: String,
    },

    /// No run carries the champion tag
    #[error("No champion in experiment '{0}'\nPromote a candidate before starting the server.")]
    NoChampion(String),

    /// Serving is degraded or not yet initialized
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Backend call exceeded its bound
    #[error("Timeout: {operation} did not complete within {after:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Configured bound
        after: Duration,
    },

    /// Champion is tagged but its artifact is unreadable or corrupt
    #[error("Artifact load failed for run {run_id}: {reason}")]
    ArtifactLoadFailed {
        /// Champion run
        run_id: String,
        /// Underlying cause
        reason: String,
    },

    /// Request or dataset failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every configured model type failed to train
    #[error("Training failed: no candidate succeeded\n{}", .failures.join("\n"))]
    TrainingFailed {
        /// One message per failed model type
        failures: Vec<String>,
    },

    /// Tracking backend error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Internal invariant broken by a collaborator
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable, serializable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::RunNotFound`]
    RunNotFound,
    /// See [`Error::DuplicateMetric`]
    DuplicateMetric,
    /// See [`Error::NoCandidates`]
    NoCandidates,
    /// See [`Error::NoChampion`]
    NoChampion,
    /// See [`Error::ServiceUnavailable`]
    ServiceUnavailable,
    /// See [`Error::Timeout`]
    Timeout,
    /// See [`Error::ArtifactLoadFailed`]
    ArtifactLoadFailed,
    /// See [`Error::InvalidInput`]
    InvalidInput,
    /// See [`Error::TrainingFailed`]
    TrainingFailed,
    /// Storage, IO and serialization failures
    Storage,
    /// See [`Error::Config`]
    Config,
    /// See [`Error::Internal`]
    Internal,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RunNotFound(_) => ErrorKind::RunNotFound,
            Self::DuplicateMetric { .. } => ErrorKind::DuplicateMetric,
            Self::NoCandidates { .. } => ErrorKind::NoCandidates,
            Self::NoChampion(_) => ErrorKind::NoChampion,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ArtifactLoadFailed { .. } => ErrorKind::ArtifactLoadFailed,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::TrainingFailed { .. } => ErrorKind::TrainingFailed,
            Self::StorageError(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NoCandidates
                | ErrorKind::NoChampion
                | ErrorKind::ServiceUnavailable
                | ErrorKind::Timeout
                | ErrorKind::Storage
        )
    }
}
