//! # ONNX Embedding Engine
//!
//! Runs a pretrained transformer encoder exported to ONNX and its
//! HuggingFace tokenizer. The engine only produces token matrices and
//! per-token hidden states; pooling and normalization happen in the
//! pipeline so every backend shares the same math.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut engine = OnnxEmbeddingEngine::new(model_path, tokenizer_path, &onnx_config, 512)?;
//! let batch = engine.tokenize(&["query: hello".to_string()])?;
//! let hidden = engine.forward(&batch)?;
//! ```

use std::path::Path;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, instrument};

use crate::models::{EmbeddingError, EmbeddingResult, EncodedBatch, HiddenStates, ModelConfig};

/// Output name used by HuggingFace encoder exports
const LAST_HIDDEN_STATE: &str = "last_hidden_state";

/// Configuration for ONNX Runtime
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Path to ONNX Runtime library (DLL/so/dylib), empty to use the default lookup
    pub library_path: String,
    /// Thread pool size for inference
    pub thread_pool_size: usize,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            library_path: String::new(),
            thread_pool_size: 4,
        }
    }
}

impl OnnxConfig {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            library_path: config.onnx_runtime_path.clone(),
            thread_pool_size: config.num_threads,
        }
    }
}

/// ONNX-based embedding engine for generating per-token hidden states
#[derive(Debug)]
pub struct OnnxEmbeddingEngine {
    /// ONNX Runtime session for model inference
    session: Session,
    /// HuggingFace tokenizer for text preprocessing
    tokenizer: Tokenizer,
    /// Maximum sequence length
    max_seq_length: usize,
    /// Token id written into padded positions
    pad_id: u32,
    /// Whether the graph declares a `token_type_ids` input
    uses_token_type_ids: bool,
    /// Name of the hidden state output
    output_name: String,
}

impl OnnxEmbeddingEngine {
    /// Create a new ONNX embedding engine
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file (model.onnx)
    /// * `tokenizer_path` - Path to the tokenizer configuration file (tokenizer.json)
    /// * `onnx_config` - ONNX Runtime configuration
    /// * `max_seq_length` - Tokens kept per input before truncation
    pub fn new(
        model_path: &Path,
        tokenizer_path: &Path,
        onnx_config: &OnnxConfig,
        max_seq_length: usize,
    ) -> Result<Self, EmbeddingError> {
        info!("Initializing ONNX embedding engine with model: {}", model_path.display());

        if !onnx_config.library_path.is_empty() {
            std::env::set_var("ORT_DYLIB_PATH", &onnx_config.library_path);
            debug!("Set ORT_DYLIB_PATH to: {}", onnx_config.library_path);
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_config.thread_pool_size)?
            .commit_from_file(model_path)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to load ONNX model: {}", e),
            })?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            EmbeddingError::ModelLoadFailed {
                error: format!("Failed to load tokenizer: {}", e),
            }
        })?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_length,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to configure truncation: {}", e),
            })?;

        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .unwrap_or(0);
        // Padding is applied by EncodedBatch so the width is the batch's own longest row.
        tokenizer.with_padding(None);

        let uses_token_type_ids = session.inputs.iter().any(|i| i.name == "token_type_ids");
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == LAST_HIDDEN_STATE)
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| EmbeddingError::ModelLoadFailed {
                error: "ONNX model declares no outputs".to_string(),
            })?;

        info!(
            "ONNX embedding engine initialized with {} threads (output: {}, token_type_ids: {})",
            onnx_config.thread_pool_size, output_name, uses_token_type_ids
        );

        Ok(Self {
            session,
            tokenizer,
            max_seq_length,
            pad_id,
            uses_token_type_ids,
            output_name,
        })
    }

    /// Tokenize a batch of texts jointly
    ///
    /// Rows are truncated to `max_seq_length` and right-padded to the longest
    /// row in this batch.
    #[instrument(skip(self, texts), fields(text_count = texts.len()))]
    pub fn tokenize(&self, texts: &[String]) -> EmbeddingResult<EncodedBatch> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                error: e.to_string(),
            })?;

        let batch = EncodedBatch::from_rows(
            encodings.iter().map(|e| (e.get_ids(), e.get_type_ids())),
            self.max_seq_length,
            self.pad_id,
        );

        debug!("Tokenized batch: {} rows x {} tokens", batch.batch_size(), batch.seq_len());
        Ok(batch)
    }

    /// Run the encoder once over a padded batch
    ///
    /// # Returns
    /// Hidden states with shape `[batch_size, seq_len, hidden_size]`
    #[instrument(skip(self, batch), fields(batch_size = batch.batch_size(), seq_len = batch.seq_len()))]
    pub fn forward(&mut self, batch: &EncodedBatch) -> EmbeddingResult<HiddenStates> {
        let shape = [batch.batch_size() as i64, batch.seq_len() as i64];

        let input_ids = Tensor::from_array((shape, batch.input_ids.iter().copied().collect::<Vec<i64>>()))
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to create input_ids tensor: {}", e),
            })?;

        let attention_mask = Tensor::from_array((shape, batch.attention_mask.iter().copied().collect::<Vec<i64>>()))
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to create attention_mask tensor: {}", e),
            })?;

        let mut inputs = vec![("input_ids", input_ids), ("attention_mask", attention_mask)];

        if self.uses_token_type_ids {
            let token_type_ids = Tensor::from_array((shape, batch.token_type_ids.iter().copied().collect::<Vec<i64>>()))
                .map_err(|e| EmbeddingError::EmbeddingFailed {
                    error: format!("Failed to create token_type_ids tensor: {}", e),
                })?;
            inputs.push(("token_type_ids", token_type_ids));
        }

        let outputs = self.session.run(inputs).map_err(|e| EmbeddingError::EmbeddingFailed {
            error: format!("ONNX inference failed: {}", e),
        })?;

        let (output_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to extract output tensor: {}", e),
            })?;

        let dims: Vec<usize> = output_shape.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!("Expected 3D output tensor, got {}D", dims.len()),
            });
        }

        HiddenStates::from_shape_vec((dims[0], dims[1], dims[2]), data.to_vec()).map_err(|e| {
            EmbeddingError::EmbeddingFailed {
                error: format!("Failed to create output array: {:?}", e),
            }
        })
    }
}
