use crate::artifacts::ModelManifest;
use crate::corpus::TrainingCorpus;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::{StoreLayout, METADATA_FILE, TRAINING_DATA_FILE};
use crate::writer::CorpusWriter;
use std::path::{Path, PathBuf};

/// A model found in the store.
#[derive(Debug, Clone)]
pub struct StoredModel {
    pub project_name: String,
    pub model_name: String,
    pub dir: PathBuf,
    pub manifest: ModelManifest,
}

fn read_manifest(path: &Path) -> TrainingResult<ModelManifest> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice::<ModelManifest>(&bytes)?)
}

fn sub_dirs(dir: &Path) -> TrainingResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Read-side view of the models persisted by `FsPersistor`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    layout: StoreLayout,
}

impl ModelStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { layout: StoreLayout::new(root) }
    }

    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Discover models by scanning `<root>/*/*/metadata.json`.
    pub fn discover(&self) -> TrainingResult<Vec<StoredModel>> {
        let mut out = Vec::new();

        for project_dir in sub_dirs(self.layout.root())? {
            for model_dir in sub_dirs(&project_dir)? {
                let manifest_path = model_dir.join(METADATA_FILE);
                if !manifest_path.exists() {
                    continue;
                }
                out.push(StoredModel {
                    project_name: file_name(&project_dir),
                    model_name: file_name(&model_dir),
                    manifest: read_manifest(&manifest_path)?,
                    dir: model_dir,
                });
            }
        }

        Ok(out)
    }

    /// Newest model whose manifest belongs to `update_id`.
    pub fn find(&self, update_id: &str) -> TrainingResult<StoredModel> {
        self.discover()?
            .into_iter()
            .filter(|m| m.manifest.update_id == update_id)
            .max_by_key(|m| m.manifest.created_at)
            .ok_or_else(|| TrainingError::ModelNotFound(update_id.to_string()))
    }

    pub fn load_corpus(&self, model: &StoredModel) -> TrainingResult<TrainingCorpus> {
        let json = std::fs::read_to_string(model.dir.join(TRAINING_DATA_FILE))?;
        CorpusWriter::loads(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn write_model(root: &Path, project: &str, model: &str, update_id: &str, age_minutes: i64) {
        let dir = root.join(project).join(model);
        std::fs::create_dir_all(&dir).unwrap();
        let manifest = ModelManifest {
            update_id: update_id.to_string(),
            repository_uuid: project.to_string(),
            language: "en".to_string(),
            trainer: "export".to_string(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            common_examples: 0,
            label_examples: 0,
            intents: vec![],
            artifacts: vec![],
        };
        std::fs::write(dir.join(METADATA_FILE), serde_json::to_vec(&manifest).unwrap()).unwrap();
        std::fs::write(dir.join(TRAINING_DATA_FILE), r#"{"rasa_nlu_data": {}}"#).unwrap();
    }

    #[test]
    fn test_discover_on_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ModelStore::new(temp.path().join("nope"));
        assert!(store.discover().unwrap().is_empty());
    }

    #[test]
    fn test_find_picks_newest_for_update() {
        let temp = TempDir::new().unwrap();
        write_model(temp.path(), "repo-a", "5", "5", 30);
        write_model(temp.path(), "repo-b", "5", "5", 1);
        write_model(temp.path(), "repo-a", "6", "6", 0);
        std::fs::create_dir_all(temp.path().join("repo-a/orphan")).unwrap();

        let store = ModelStore::new(temp.path().to_path_buf());
        assert_eq!(store.discover().unwrap().len(), 3);

        let found = store.find("5").unwrap();
        assert_eq!(found.project_name, "repo-b");
        assert_eq!(found.model_name, "5");
        assert!(store.load_corpus(&found).unwrap().is_empty());

        assert!(matches!(store.find("9"), Err(TrainingError::ModelNotFound(_))));
    }
}
