use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training corpus: {0}")]
    InvalidCorpus(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("persist error: {0}")]
    Persist(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("no persisted model for update {0}")]
    ModelNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
