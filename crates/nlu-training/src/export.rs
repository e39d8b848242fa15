//! Local trainer that exports the corpus as the model.
//!
//! No learning happens here: the "model" is the canonical corpus document
//! plus a manifest. It is what `LookupInterpreter` serves from and what the
//! worker uses when no external training engine is wired in.

use crate::artifacts::{make_artifact, ArtifactKind, ModelManifest};
use crate::corpus::TrainingCorpus;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::{METADATA_FILE, TRAINING_DATA_FILE};
use crate::trainer::{PersistedModel, Persistor, Trainer, TrainerConfig, TrainerFactory};
use crate::writer::CorpusWriter;
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ExportTrainer {
    config: TrainerConfig,
    corpus: Option<TrainingCorpus>,
}

impl ExportTrainer {
    #[must_use]
    pub fn new(config: TrainerConfig) -> Self {
        Self { config, corpus: None }
    }
}

fn write_json<P: AsRef<Path>, T: serde::Serialize>(path: P, value: &T) -> TrainingResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[async_trait]
impl Trainer for ExportTrainer {
    fn id(&self) -> &'static str {
        "export"
    }

    async fn train(&mut self, corpus: &TrainingCorpus) -> TrainingResult<()> {
        if corpus.common_examples.is_empty() {
            return Err(TrainingError::InvalidCorpus(
                "at least one common example is required".to_string(),
            ));
        }

        info!(
            update_id = %self.config.update_id,
            language = %self.config.language,
            common_examples = corpus.common_examples.len(),
            label_examples = corpus.label_examples.len(),
            intents = ?corpus.intents(),
            "Training export model"
        );
        self.corpus = Some(corpus.clone());
        Ok(())
    }

    async fn persist(
        &self,
        scratch_dir: &Path,
        persistor: &dyn Persistor,
        project_name: &str,
        fixed_model_name: &str,
    ) -> TrainingResult<PersistedModel> {
        let corpus = self
            .corpus
            .as_ref()
            .ok_or_else(|| TrainingError::Trainer("persist called before train".to_string()))?;

        std::fs::create_dir_all(scratch_dir)?;
        std::fs::write(scratch_dir.join(TRAINING_DATA_FILE), CorpusWriter::dumps(corpus)?)?;

        let manifest = ModelManifest {
            update_id: self.config.update_id.clone(),
            repository_uuid: self.config.repository_uuid.clone(),
            language: self.config.language.clone(),
            trainer: self.id().to_string(),
            created_at: Utc::now(),
            common_examples: corpus.common_examples.len(),
            label_examples: corpus.label_examples.len(),
            intents: corpus.intents().into_iter().map(str::to_string).collect(),
            artifacts: vec![make_artifact(ArtifactKind::TrainingData, scratch_dir, TRAINING_DATA_FILE)?],
        };
        write_json(scratch_dir.join(METADATA_FILE), &manifest)?;

        info!(
            scratch_dir = %scratch_dir.display(),
            project_name,
            model_name = fixed_model_name,
            "Persisting export model"
        );
        persistor.persist(scratch_dir, project_name, fixed_model_name).await
    }
}

/// Creates an `ExportTrainer` per job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportTrainerFactory;

impl TrainerFactory for ExportTrainerFactory {
    fn create(&self, config: &TrainerConfig) -> TrainingResult<Box<dyn Trainer>> {
        Ok(Box::new(ExportTrainer::new(config.clone())))
    }
}
