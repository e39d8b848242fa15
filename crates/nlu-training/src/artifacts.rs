use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TrainingData,
    Other,
}

/// A file inside a model directory. `file_name` is relative to that directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub update_id: String,
    pub repository_uuid: String,
    pub language: String,
    pub trainer: String,
    pub created_at: DateTime<Utc>,
    pub common_examples: usize,
    pub label_examples: usize,
    #[serde(default)]
    pub intents: Vec<String>,
    pub artifacts: Vec<ModelArtifact>,
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_artifact(kind: ArtifactKind, dir: &Path, file_name: &str) -> TrainingResult<ModelArtifact> {
    let path = dir.join(file_name);
    if !path.exists() {
        return Err(TrainingError::Artifact(format!(
            "artifact path does not exist: {}",
            path.display()
        )));
    }

    let hash = sha256_file(&path)?;
    Ok(ModelArtifact { kind, file_name: file_name.to_string(), sha256: hash })
}
