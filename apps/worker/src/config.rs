//! Worker configuration file support.
//!
//! Configuration precedence:
//! 1. CLI arguments (handled by clap)
//! 2. Environment variables (`NLU_BACKEND_URL`, `NLU_MODEL_STORE`)
//! 3. File given with `--config`
//! 4. Local config file (./.nlu-worker.toml)
//! 5. Global config file (~/.nlu-worker/config.toml)
//! 6. Defaults

use nlu_backend::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

pub const ENV_BACKEND_URL: &str = "NLU_BACKEND_URL";
pub const ENV_MODEL_STORE: &str = "NLU_MODEL_STORE";

const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Backend connection section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Worker configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub backend: BackendSection,

    /// Root directory of persisted models
    #[serde(default)]
    pub model_store: Option<PathBuf>,

    /// Console log filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Most verbose level kept in training transcripts
    #[serde(default)]
    pub capture_level: Option<String>,

    /// Tasks run at the same time by `serve`
    #[serde(default)]
    pub max_concurrent_jobs: Option<usize>,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum WorkerConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type WorkerConfigResult<T> = std::result::Result<T, WorkerConfigError>;

fn home_dir() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

impl WorkerConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> WorkerConfigResult<Self> {
        if !path.exists() {
            return Err(WorkerConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| WorkerConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| WorkerConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        home_dir().join(".nlu-worker").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".nlu-worker.toml")
    }

    /// Discover and load configuration files, then apply environment overrides.
    ///
    /// Missing global and local files are skipped; an explicit file must exist.
    /// A file that exists but does not parse is an error.
    pub fn discover_and_load(explicit: Option<&Path>) -> WorkerConfigResult<Self> {
        let mut config = Self::default();

        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::load_from_file(&path) {
                Ok(found) => config.merge(&found),
                Err(WorkerConfigError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(path) = explicit {
            config.merge(&Self::load_from_file(path)?);
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref base_url) = other.backend.base_url {
            self.backend.base_url = Some(base_url.clone());
        }
        if let Some(timeout_secs) = other.backend.timeout_secs {
            self.backend.timeout_secs = Some(timeout_secs);
        }
        if let Some(ref model_store) = other.model_store {
            self.model_store = Some(model_store.clone());
        }
        if let Some(ref log_level) = other.log_level {
            self.log_level = Some(log_level.clone());
        }
        if let Some(ref capture_level) = other.capture_level {
            self.capture_level = Some(capture_level.clone());
        }
        if let Some(max) = other.max_concurrent_jobs {
            self.max_concurrent_jobs = Some(max);
        }
    }

    /// Overrides values from environment variables, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend.base_url = Some(url);
        }
        if let Some(store) = lookup(ENV_MODEL_STORE).filter(|v| !v.is_empty()) {
            self.model_store = Some(PathBuf::from(store));
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        let defaults = BackendConfig::default();
        BackendConfig {
            base_url: self.backend.base_url.clone().unwrap_or(defaults.base_url),
            timeout_secs: self.backend.timeout_secs,
        }
    }

    pub fn model_store(&self) -> PathBuf {
        self.model_store.clone().unwrap_or_else(|| home_dir().join(".nlu-worker").join("models"))
    }

    pub fn capture_level(&self) -> WorkerConfigResult<Level> {
        match self.capture_level.as_deref() {
            None => Ok(Level::DEBUG),
            Some(raw) => Level::from_str(raw)
                .map_err(|_| WorkerConfigError::InvalidValue(format!("capture_level: {raw:?}"))),
        }
    }

    pub fn max_concurrent_jobs(&self) -> WorkerConfigResult<usize> {
        match self.max_concurrent_jobs {
            None => Ok(DEFAULT_MAX_CONCURRENT_JOBS),
            Some(0) => Err(WorkerConfigError::InvalidValue("max_concurrent_jobs must be at least 1".to_string())),
            Some(n) => Ok(n),
        }
    }
}
