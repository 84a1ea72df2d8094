//! Model definitions and traits
//!
//! This module defines the capability the embedding pipeline needs from a
//! pretrained model: turning a batch of strings into padded token matrices,
//! and running the forward pass over them.

use async_trait::async_trait;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::models::config::ModelConfig;
use crate::models::EmbeddingResult;

/// Per-token hidden vectors, shape `(batch, sequence, hidden)`
pub type HiddenStates = Array3<f32>;

/// Information about a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    /// Model description
    pub description: String,
    /// Embedding dimension (0 when not known ahead of the first forward pass)
    pub dimension: usize,
    /// Maximum sequence length
    pub max_sequence_length: usize,
    /// Pooling mode
    pub pooling_mode: String,
    /// Model file path
    pub model_path: String,
    /// Tokenizer path
    pub tokenizer_path: String,
}

impl ModelInfo {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            name: config.model_id.clone(),
            description: config.description.clone(),
            dimension: config.embedding_dimension,
            max_sequence_length: config.max_sequence_length,
            pooling_mode: "mean".to_string(),
            model_path: config.model_path().to_string_lossy().to_string(),
            tokenizer_path: config.tokenizer_path().to_string_lossy().to_string(),
        }
    }
}

/// Tokenized batch, one row per input string, right-padded to the longest row.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub input_ids: Array2<i64>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Array2<i64>,
    pub token_type_ids: Array2<i64>,
}

impl EncodedBatch {
    /// Build a batch from `(token ids, type ids)` rows.
    ///
    /// Rows longer than `max_length` are truncated. The padded width is the
    /// longest remaining row, not `max_length`.
    pub fn from_rows<'a, I>(rows: I, max_length: usize, pad_id: u32) -> Self
    where
        I: IntoIterator<Item = (&'a [u32], &'a [u32])>,
    {
        let rows: Vec<(&[u32], &[u32])> = rows
            .into_iter()
            .map(|(ids, type_ids)| (&ids[..ids.len().min(max_length)], type_ids))
            .collect();

        let batch_size = rows.len();
        let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0);

        let mut input_ids = Array2::from_elem((batch_size, seq_len), i64::from(pad_id));
        let mut attention_mask = Array2::zeros((batch_size, seq_len));
        let mut token_type_ids = Array2::zeros((batch_size, seq_len));

        for (row, (ids, type_ids)) in rows.iter().enumerate() {
            for (col, &id) in ids.iter().enumerate() {
                input_ids[[row, col]] = i64::from(id);
                attention_mask[[row, col]] = 1;
                token_type_ids[[row, col]] = type_ids.get(col).map_or(0, |&t| i64::from(t));
            }
        }

        Self {
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }

    /// Number of real tokens in each row
    pub fn token_counts(&self) -> Vec<usize> {
        self.attention_mask
            .outer_iter()
            .map(|row| row.iter().filter(|&&bit| bit != 0).count())
            .collect()
    }
}

/// Core embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Acquire weights and tokenizer
    async fn initialize(&mut self) -> EmbeddingResult<()>;

    /// Check if the model is ready for inference
    fn is_ready(&self) -> bool;

    /// Tokenize a batch jointly into a padded, truncated [`EncodedBatch`]
    fn tokenize(&self, texts: &[String]) -> EmbeddingResult<EncodedBatch>;

    /// Run the forward pass once over the whole batch
    async fn forward(&mut self, batch: &EncodedBatch) -> EmbeddingResult<HiddenStates>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize {
        self.info().dimension
    }
}

/// ONNX-based embedding model implementation
#[cfg(feature = "onnx")]
pub mod onnx {
    use super::*;
    use crate::onnx::{OnnxConfig, OnnxEmbeddingEngine};
    use tracing::debug;

    /// ONNX embedding model
    pub struct OnnxEmbeddingModel {
        info: ModelInfo,
        engine: Option<OnnxEmbeddingEngine>,
        config: ModelConfig,
    }

    impl OnnxEmbeddingModel {
        /// Create a new ONNX embedding model
        pub fn new(config: ModelConfig) -> Self {
            Self {
                info: ModelInfo::from_config(&config),
                engine: None,
                config,
            }
        }

        fn engine(&self) -> EmbeddingResult<&OnnxEmbeddingEngine> {
            self.engine
                .as_ref()
                .ok_or_else(|| crate::EmbeddingError::ModelNotReady {
                    model_name: self.info.name.clone(),
                })
        }
    }

    #[async_trait]
    impl EmbeddingModel for OnnxEmbeddingModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn initialize(&mut self) -> EmbeddingResult<()> {
            let model_path = self.config.model_path();
            let tokenizer_path = self.config.tokenizer_path();
            if !model_path.exists() {
                return Err(crate::EmbeddingError::ModelLoadFailed {
                    error: format!("model file not found: {}", model_path.display()),
                });
            }

            let onnx_config = OnnxConfig::from_model_config(&self.config);
            let engine = OnnxEmbeddingEngine::new(
                &model_path,
                &tokenizer_path,
                &onnx_config,
                self.config.max_sequence_length,
            )?;

            debug!("ONNX model {} ready", self.info.name);
            self.engine = Some(engine);
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.engine.is_some()
        }

        fn tokenize(&self, texts: &[String]) -> EmbeddingResult<EncodedBatch> {
            self.engine()?.tokenize(texts)
        }

        async fn forward(&mut self, batch: &EncodedBatch) -> EmbeddingResult<HiddenStates> {
            let model_name = self.info.name.clone();
            let engine = self
                .engine
                .as_mut()
                .ok_or_else(|| crate::EmbeddingError::ModelNotReady {
                    model_name: model_name.clone(),
                })?;

            engine
                .forward(batch)
                .map_err(|e| crate::EmbeddingError::InferenceError {
                    model_name,
                    error: e.to_string(),
                })
        }
    }
}

/// Stand-in used when the crate is built without ONNX support
#[cfg(not(feature = "onnx"))]
mod unavailable {
    use super::*;

    pub struct UnavailableModel {
        pub(super) info: ModelInfo,
    }

    #[async_trait]
    impl EmbeddingModel for UnavailableModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn initialize(&mut self) -> EmbeddingResult<()> {
            Err(crate::EmbeddingError::ModelLoadFailed {
                error: "built without the `onnx` feature".to_string(),
            })
        }

        fn is_ready(&self) -> bool {
            false
        }

        fn tokenize(&self, _texts: &[String]) -> EmbeddingResult<EncodedBatch> {
            Err(crate::EmbeddingError::ModelNotReady {
                model_name: self.info.name.clone(),
            })
        }

        async fn forward(&mut self, _batch: &EncodedBatch) -> EmbeddingResult<HiddenStates> {
            Err(crate::EmbeddingError::ModelNotReady {
                model_name: self.info.name.clone(),
            })
        }
    }
}

/// Factory for creating embedding models
pub struct ModelFactory;

impl ModelFactory {
    /// Create a model from configuration
    #[cfg(feature = "onnx")]
    pub fn create_model(config: &ModelConfig) -> Box<dyn EmbeddingModel> {
        Box::new(onnx::OnnxEmbeddingModel::new(config.clone()))
    }

    /// Create a model from configuration
    #[cfg(not(feature = "onnx"))]
    pub fn create_model(config: &ModelConfig) -> Box<dyn EmbeddingModel> {
        Box::new(unavailable::UnavailableModel {
            info: ModelInfo::from_config(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_model_info_from_config() {
        let info = ModelInfo::from_config(&ModelConfig::default());

        assert_eq!(info.name, "intfloat/multilingual-e5-large-instruct");
        assert_eq!(info.dimension, 1024);
        assert_eq!(info.max_sequence_length, 512);
        assert_eq!(info.pooling_mode, "mean");
    }

    #[test]
    fn test_batch_pads_to_longest_row() {
        let short: Vec<u32> = vec![5, 6];
        let long: Vec<u32> = vec![7, 8, 9, 10];
        let types: Vec<u32> = vec![];

        let batch = EncodedBatch::from_rows(
            [(short.as_slice(), types.as_slice()), (long.as_slice(), types.as_slice())],
            512,
            1,
        );

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.seq_len(), 4);
        assert_eq!(batch.input_ids, array![[5, 6, 1, 1], [7, 8, 9, 10]]);
        assert_eq!(batch.attention_mask, array![[1, 1, 0, 0], [1, 1, 1, 1]]);
        assert_eq!(batch.token_type_ids, Array2::<i64>::zeros((2, 4)));
        assert_eq!(batch.token_counts(), vec![2, 4]);
    }

    #[test]
    fn test_batch_truncates_long_rows() {
        let long: Vec<u32> = (0..600).collect();
        let short: Vec<u32> = vec![3];
        let types: Vec<u32> = vec![0; 600];

        let batch = EncodedBatch::from_rows(
            [(long.as_slice(), types.as_slice()), (short.as_slice(), &types[..1])],
            512,
            0,
        );

        assert_eq!(batch.seq_len(), 512);
        assert_eq!(batch.token_counts(), vec![512, 1]);
        assert_eq!(batch.input_ids[[0, 511]], 511);
    }

    #[test]
    fn test_empty_batch() {
        let batch = EncodedBatch::from_rows(std::iter::empty::<(&[u32], &[u32])>(), 512, 0);
        assert_eq!(batch.batch_size(), 0);
        assert_eq!(batch.seq_len(), 0);
    }
}
