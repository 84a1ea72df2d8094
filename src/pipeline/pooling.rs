//! Masked mean pooling and L2 normalization

use ndarray::{Array2, ArrayView2, ArrayView3};

use crate::models::{EmbeddingError, EmbeddingResult};

/// Average each row's hidden vectors over its real tokens only.
///
/// # Arguments
/// * `hidden` - Hidden states `[batch_size, seq_len, hidden_size]`
/// * `attention_mask` - `[batch_size, seq_len]`, 1 for real tokens and 0 for padding
///
/// # Returns
/// Pooled vectors `[batch_size, hidden_size]`
pub fn masked_mean_pool(
    hidden: ArrayView3<f32>,
    attention_mask: ArrayView2<i64>,
) -> EmbeddingResult<Array2<f32>> {
    let (batch_size, seq_len, hidden_size) = hidden.dim();

    if attention_mask.dim() != (batch_size, seq_len) {
        return Err(EmbeddingError::EmbeddingFailed {
            error: format!(
                "Attention mask shape {:?} doesn't match hidden states {:?}",
                attention_mask.dim(),
                (batch_size, seq_len)
            ),
        });
    }

    let mut pooled = Array2::<f32>::zeros((batch_size, hidden_size));

    for ((states, mask), mut sum) in hidden
        .outer_iter()
        .zip(attention_mask.outer_iter())
        .zip(pooled.outer_iter_mut())
    {
        let mut valid_tokens = 0usize;

        for (token, &bit) in states.outer_iter().zip(mask.iter()) {
            if bit != 0 {
                sum += &token;
                valid_tokens += 1;
            }
        }

        if valid_tokens == 0 {
            return Err(EmbeddingError::EmbeddingFailed {
                error: "No valid tokens found in attention mask".to_string(),
            });
        }

        sum /= valid_tokens as f32;
    }

    Ok(pooled)
}

/// Scale every row to unit Euclidean length.
pub fn l2_normalize(mut embeddings: Array2<f32>) -> EmbeddingResult<Array2<f32>> {
    for mut row in embeddings.outer_iter_mut() {
        let norm = row.dot(&row).sqrt();

        if norm == 0.0 || !norm.is_finite() {
            return Err(EmbeddingError::EmbeddingFailed {
                error: "Cannot normalize zero vector".to_string(),
            });
        }

        row /= norm;
    }

    Ok(embeddings)
}
