use std::path::{Path, PathBuf};

/// File holding the canonical corpus document inside a model directory.
pub const TRAINING_DATA_FILE: &str = "training_data.json";

/// File holding the `ModelManifest` inside a model directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Filesystem layout of the model store.
///
/// Models live under `<root>/<project_name>/<model_name>/`.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn project_dir(&self, project_name: &str) -> PathBuf {
        self.root.join(project_name)
    }

    #[must_use]
    pub fn model_dir(&self, project_name: &str, model_name: &str) -> PathBuf {
        self.project_dir(project_name).join(model_name)
    }

    #[must_use]
    pub fn metadata_path(&self, project_name: &str, model_name: &str) -> PathBuf {
        self.model_dir(project_name, model_name).join(METADATA_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path().to_path_buf());

        let model_dir = layout.model_dir("repo-1", "42");
        assert!(model_dir.starts_with(layout.root()));
        assert!(model_dir.ends_with("repo-1/42"));
        assert!(layout.metadata_path("repo-1", "42").ends_with("repo-1/42/metadata.json"));
    }
}
