//! Embedding pipeline
//!
//! format → tokenize (joint, padded, truncated) → forward → masked mean pool
//! → L2 normalize. Output order matches input order and every vector has
//! unit length, so cosine similarity is a plain dot product.

pub mod formatter;
pub mod pooling;

pub use formatter::{format_text_for_embedding, TextFormatter, DEFAULT_TASK_DESCRIPTION};
pub use pooling::{l2_normalize, masked_mean_pool};

use tracing::{debug, instrument};

use crate::models::{Embedding, EmbeddingError, EmbeddingModel, EmbeddingResult};

/// Generate one unit-norm embedding per input text.
///
/// The whole batch goes through a single forward pass. Any tokenizer or
/// model failure fails the call; there are no partial results.
#[instrument(skip_all, fields(text_count = texts.len(), is_query = is_query))]
pub async fn embed(
    model: &mut dyn EmbeddingModel,
    formatter: &TextFormatter,
    texts: &[String],
    is_query: bool,
) -> EmbeddingResult<Vec<Embedding>> {
    if texts.is_empty() {
        return Err(EmbeddingError::InvalidInput {
            message: "Texts must be a non-empty list of strings".to_string(),
        });
    }

    let inputs: Vec<String> = texts.iter().map(|text| formatter.format(text, is_query)).collect();

    let batch = model.tokenize(&inputs)?;
    let hidden = model.forward(&batch).await?;

    let (rows, seq_len, hidden_size) = hidden.dim();
    if rows != batch.batch_size() || seq_len != batch.seq_len() {
        return Err(EmbeddingError::EmbeddingFailed {
            error: format!(
                "Hidden states shape {:?} doesn't match batch {:?}",
                hidden.dim(),
                (batch.batch_size(), batch.seq_len())
            ),
        });
    }

    let expected = model.dimension();
    if expected != 0 && hidden_size != expected {
        return Err(EmbeddingError::EmbeddingFailed {
            error: format!("Expected hidden size {}, model produced {}", expected, hidden_size),
        });
    }

    let pooled = masked_mean_pool(hidden.view(), batch.attention_mask.view())?;
    let normalized = l2_normalize(pooled)?;

    debug!("Generated {} embeddings of dimension {}", rows, hidden_size);
    Ok(normalized.outer_iter().map(|row| row.to_vec()).collect())
}
