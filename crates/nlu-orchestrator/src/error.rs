// Error types for training jobs and tasks

use nlu_abstraction::BackendError;
use nlu_training::{CorpusBuildError, TrainingError};
use thiserror::Error;

/// Result type for orchestration operations
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

/// Why a training job ended in the failed state.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The backend could not be reached or answered with something unusable.
    #[error(transparent)]
    BackendUnavailable(#[from] BackendError),

    /// A per-example fetch failed while assembling the corpus.
    #[error(transparent)]
    CorpusBuild(#[from] CorpusBuildError),

    /// The trainer or persistor failed.
    #[error("training engine error: {0}")]
    TrainingEngine(#[from] TrainingError),

    /// The job was cancelled before it finished.
    #[error("training job {0} was cancelled")]
    Cancelled(String),
}

impl OrchestratorError {
    /// Short name of the error class, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::CorpusBuild(_) => "corpus_build",
            Self::TrainingEngine(_) => "training_engine",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Which best-effort report could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Failure,
    Log,
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failure => f.write_str("failure"),
            Self::Log => f.write_str("training log"),
        }
    }
}

/// A report to the backend failed. Never replaces the job's own outcome.
#[derive(Debug, Clone, Error)]
#[error("could not report {kind} for update {update_id}: {source}")]
pub struct ReportingError {
    pub kind: ReportKind,
    pub update_id: String,
    #[source]
    pub source: BackendError,
}

impl ReportingError {
    #[must_use]
    pub fn new(kind: ReportKind, update_id: &str, source: BackendError) -> Self {
        Self { kind, update_id: update_id.to_string(), source }
    }
}

/// Task dispatch errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// The training job failed.
    #[error(transparent)]
    Train(#[from] OrchestratorError),

    /// Parsing text against a model failed.
    #[error("parse failed: {0}")]
    Parse(#[source] TrainingError),

    /// Evaluating a model failed.
    #[error("evaluation failed: {0}")]
    Evaluate(#[source] TrainingError),

    /// The task payload could not be decoded.
    #[error("invalid task request: {0}")]
    InvalidRequest(#[from] serde_json::Error),
}
