//! Configuration for the embedding model
//!
//! Describes where the pretrained weights and tokenizer live, how inputs are
//! bounded, and what happens when loading them fails.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Model identifier the provisioning step caches weights under.
pub const DEFAULT_MODEL_ID: &str = "intfloat/multilingual-e5-large-instruct";

/// Hard cap on tokens per input row.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// Hidden size of the default model.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;

/// What to do on later calls after the model failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitFailurePolicy {
    /// Attempt the load again on every call.
    #[default]
    Retry,
    /// Remember the first failure and report it without reloading.
    Cache,
}

/// Configuration for the embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Pretrained model identifier
    pub model_id: String,
    pub description: String,

    /// Root directory of provisioned models; weights live in `{model_dir}/{model_id}`
    pub model_dir: PathBuf,
    pub model_file: String,
    pub tokenizer_file: String,

    /// Model parameters
    pub max_sequence_length: usize,
    /// Expected hidden size, 0 skips the check
    pub embedding_dimension: usize,

    /// Runtime settings
    pub num_threads: usize,
    pub onnx_runtime_path: String,

    pub init_failure_policy: InitFailurePolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            description: "Multilingual E5 large, instruction tuned".to_string(),
            model_dir: PathBuf::from("models"),
            model_file: "model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            num_threads: 4,
            onnx_runtime_path: String::new(),
            init_failure_policy: InitFailurePolicy::Retry,
        }
    }
}

impl ModelConfig {
    /// Directory holding this model's files
    pub fn model_root(&self) -> PathBuf {
        self.model_dir.join(&self.model_id)
    }

    /// Full path to the ONNX weights
    pub fn model_path(&self) -> PathBuf {
        self.model_root().join(&self.model_file)
    }

    /// Full path to `tokenizer.json`
    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_root().join(&self.tokenizer_file)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::models::EmbeddingError> {
        if self.model_id.trim().is_empty() {
            return Err(crate::models::EmbeddingError::ConfigError {
                message: "model_id must not be empty".to_string(),
            });
        }

        if self.max_sequence_length == 0 {
            return Err(crate::models::EmbeddingError::ConfigError {
                message: "max_sequence_length must be greater than zero".to_string(),
            });
        }

        if self.num_threads == 0 {
            return Err(crate::models::EmbeddingError::ConfigError {
                message: "num_threads must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
