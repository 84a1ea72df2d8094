//! Embedding Service Configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{EmbeddingError, ModelConfig};
use crate::pipeline::DEFAULT_TASK_DESCRIPTION;

/// Explicit config file location
pub const CONFIG_PATH_ENV: &str = "EMBEDDING_SERVICE_CONFIG";
/// Overrides `model.model_dir`
pub const MODEL_DIR_ENV: &str = "EMBEDDING_MODEL_DIR";
/// Looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub model: ModelConfig,
    pub service: DispatchConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Load the model before reading the first line
    pub eager_initialize: bool,
    /// Task sentence placed in the query instruction prefix
    pub query_task_description: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            eager_initialize: true,
            query_task_description: DEFAULT_TASK_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EmbeddingError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, EmbeddingError> {
        let config: ServiceConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Resolve configuration from the environment.
    ///
    /// `EMBEDDING_SERVICE_CONFIG` must point at an existing file when set.
    /// Otherwise `config.toml` is used if present, falling back to defaults.
    /// `EMBEDDING_MODEL_DIR` overrides the model directory either way.
    pub fn load() -> Result<Self, EmbeddingError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };

        if let Some(dir) = std::env::var_os(MODEL_DIR_ENV) {
            config.model.model_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EmbeddingError> {
        self.model.validate()
    }
}
