use crate::corpus::TrainingCorpus;
use crate::error::TrainingResult;
use async_trait::async_trait;
use nlu_abstraction::TrainingRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Trainer configuration derived from a training request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub update_id: String,
    pub language: String,
    pub repository_uuid: String,
    /// Backend-provided keys the worker does not interpret (algorithm, flags, ...).
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl TrainerConfig {
    #[must_use]
    pub fn from_request(request: &TrainingRequest) -> Self {
        Self {
            update_id: request.update_id.clone(),
            language: request.language.clone(),
            repository_uuid: request.repository_uuid.clone(),
            settings: request.settings.clone(),
        }
    }

    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }
}

/// Where a persisted model ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub project_name: String,
    pub model_name: String,
    pub location: PathBuf,
}

/// Durable storage for trained model directories, bound to one job.
#[async_trait]
pub trait Persistor: Send + Sync {
    fn job_id(&self) -> &str;

    /// Stores the contents of `model_dir` under `project_name`/`model_name`.
    /// The persistor owns `model_dir` afterwards and is responsible for removing it.
    async fn persist(&self, model_dir: &Path, project_name: &str, model_name: &str) -> TrainingResult<PersistedModel>;
}

pub trait PersistorFactory: Send + Sync {
    fn for_job(&self, job_id: &str) -> Box<dyn Persistor>;
}

#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    async fn train(&mut self, corpus: &TrainingCorpus) -> TrainingResult<()>;

    async fn persist(
        &self,
        scratch_dir: &Path,
        persistor: &dyn Persistor,
        project_name: &str,
        fixed_model_name: &str,
    ) -> TrainingResult<PersistedModel>;
}

pub trait TrainerFactory: Send + Sync {
    fn create(&self, config: &TrainerConfig) -> TrainingResult<Box<dyn Trainer>>;
}
