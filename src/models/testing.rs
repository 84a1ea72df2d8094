//! Deterministic stand-in model for unit tests
//!
//! Words map to stable token ids, and each real token's hidden vector depends
//! only on its id. Padded positions get a large constant so any pooling that
//! fails to mask them shows up immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::models::config::ModelConfig;
use crate::models::manager::ModelFactoryFn;
use crate::models::model::{EmbeddingModel, EncodedBatch, HiddenStates, ModelInfo};
use crate::models::{EmbeddingError, EmbeddingResult};

const CLS_ID: u32 = 2;
const SEP_ID: u32 = 3;
const PAD_ID: u32 = 1;
const PAD_VALUE: f32 = 1000.0;

/// Shared observation point, survives the model being moved into a manager
#[derive(Debug, Default)]
pub(crate) struct MockCounters {
    pub init_attempts: AtomicUsize,
    pub forward_calls: AtomicUsize,
    pub remaining_failures: AtomicUsize,
    pub last_seq_len: Mutex<Option<usize>>,
}

impl MockCounters {
    pub fn failing(times: usize) -> Arc<Self> {
        let counters = Self::default();
        counters.remaining_failures.store(times, Ordering::SeqCst);
        Arc::new(counters)
    }

    pub fn init_attempts(&self) -> usize {
        self.init_attempts.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockEmbeddingModel {
    info: ModelInfo,
    ready: bool,
    counters: Arc<MockCounters>,
}

impl MockEmbeddingModel {
    pub const DIMENSION: usize = 8;

    pub fn new() -> Self {
        Self::with_counters(Arc::default())
    }

    pub fn with_counters(counters: Arc<MockCounters>) -> Self {
        let config = ModelConfig {
            model_id: "mock-encoder".to_string(),
            embedding_dimension: Self::DIMENSION,
            ..ModelConfig::default()
        };

        Self {
            info: ModelInfo::from_config(&config),
            ready: false,
            counters,
        }
    }

    /// Model whose advertised dimension disagrees with what forward produces
    pub fn with_expected_dimension(dimension: usize) -> Self {
        let mut model = Self::new();
        model.info.dimension = dimension;
        model
    }

    /// Factory handing out mocks that share `counters`
    pub fn factory(counters: Arc<MockCounters>) -> ModelFactoryFn {
        Box::new(move |_config: &ModelConfig| {
            Box::new(MockEmbeddingModel::with_counters(Arc::clone(&counters))) as Box<dyn EmbeddingModel>
        })
    }

    pub fn forward_calls(&self) -> usize {
        self.counters.forward_calls.load(Ordering::SeqCst)
    }

    pub fn last_seq_len(&self) -> Option<usize> {
        *self.counters.last_seq_len.lock().unwrap()
    }

    fn word_id(word: &str) -> u32 {
        // FNV-1a
        let mut hash: u32 = 0x811c_9dc5;
        for byte in word.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        10 + hash % 5000
    }

    fn token_value(id: i64, dim: usize) -> f32 {
        let mixed = (id as u64).wrapping_mul(2_654_435_761).wrapping_add(dim as u64 * 40_503);
        (mixed % 1000) as f32 / 500.0 - 1.0
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn initialize(&mut self) -> EmbeddingResult<()> {
        self.counters.init_attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .counters
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EmbeddingError::ModelLoadFailed {
                error: "weights unavailable".to_string(),
            });
        }

        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn tokenize(&self, texts: &[String]) -> EmbeddingResult<EncodedBatch> {
        if !self.ready {
            return Err(EmbeddingError::ModelNotReady {
                model_name: self.info.name.clone(),
            });
        }

        let rows: Vec<Vec<u32>> = texts
            .iter()
            .map(|text| {
                std::iter::once(CLS_ID)
                    .chain(text.split_whitespace().map(Self::word_id))
                    .chain(std::iter::once(SEP_ID))
                    .collect()
            })
            .collect();
        let no_types: Vec<u32> = Vec::new();

        Ok(EncodedBatch::from_rows(
            rows.iter().map(|ids| (ids.as_slice(), no_types.as_slice())),
            self.info.max_sequence_length,
            PAD_ID,
        ))
    }

    async fn forward(&mut self, batch: &EncodedBatch) -> EmbeddingResult<HiddenStates> {
        self.counters.forward_calls.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_seq_len.lock().unwrap() = Some(batch.seq_len());

        let shape = (batch.batch_size(), batch.seq_len(), Self::DIMENSION);
        Ok(HiddenStates::from_shape_fn(shape, |(row, col, dim)| {
            if batch.attention_mask[[row, col]] == 0 {
                PAD_VALUE
            } else {
                Self::token_value(batch.input_ids[[row, col]], dim)
            }
        }))
    }
}
