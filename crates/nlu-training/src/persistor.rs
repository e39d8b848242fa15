use crate::error::{TrainingError, TrainingResult};
use crate::layout::StoreLayout;
use crate::trainer::{PersistedModel, Persistor, PersistorFactory};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persists model directories into a local `StoreLayout`.
///
/// A model persisted twice under the same name replaces the previous one,
/// once the new copy is complete in a staging directory next to it.
#[derive(Debug, Clone)]
pub struct FsPersistor {
    layout: StoreLayout,
    job_id: String,
}

impl FsPersistor {
    #[must_use]
    pub fn new(layout: StoreLayout, job_id: impl Into<String>) -> Self {
        Self { layout, job_id: job_id.into() }
    }
}

fn validate_name(kind: &str, name: &str) -> TrainingResult<()> {
    if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(TrainingError::Persist(format!("invalid {kind}: {name:?}")));
    }
    Ok(())
}

/// Sibling of `target` that a job copies into before swapping it in.
fn staging_dir(target: &Path, job_id: &str) -> PathBuf {
    let job: String = job_id.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp-{job}"));
    target.with_file_name(name)
}

fn copy_dir(from: &Path, to: &Path) -> TrainingResult<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl Persistor for FsPersistor {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    async fn persist(&self, model_dir: &Path, project_name: &str, model_name: &str) -> TrainingResult<PersistedModel> {
        validate_name("project name", project_name)?;
        validate_name("model name", model_name)?;
        if !model_dir.is_dir() {
            return Err(TrainingError::Persist(format!(
                "model directory does not exist: {}",
                model_dir.display()
            )));
        }

        let target = self.layout.model_dir(project_name, model_name);
        let staging = staging_dir(&target, &self.job_id);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        if let Err(e) = copy_dir(model_dir, &staging) {
            warn!(job_id = %self.job_id, staging = %staging.display(), error = %e, "Copy into store failed");
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                warn!(job_id = %self.job_id, error = %cleanup, "Failed to remove staging directory");
            }
            return Err(e);
        }
        if target.exists() {
            warn!(job_id = %self.job_id, target = %target.display(), "Replacing previously persisted model");
            std::fs::remove_dir_all(&target)?;
        }
        std::fs::rename(&staging, &target)?;

        if let Err(e) = std::fs::remove_dir_all(model_dir) {
            warn!(job_id = %self.job_id, error = %e, "Failed to remove scratch directory");
        }

        info!(job_id = %self.job_id, location = %target.display(), "Model persisted");
        Ok(PersistedModel {
            project_name: project_name.to_string(),
            model_name: model_name.to_string(),
            location: target,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FsPersistorFactory {
    layout: StoreLayout,
}

impl FsPersistorFactory {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { layout: StoreLayout::new(root) }
    }
}

impl PersistorFactory for FsPersistorFactory {
    fn for_job(&self, job_id: &str) -> Box<dyn Persistor> {
        Box::new(FsPersistor::new(self.layout.clone(), job_id))
    }
}
