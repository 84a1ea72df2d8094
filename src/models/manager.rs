//! Embedding Models Manager
//!
//! Owns the single model handle for the life of the process. The model is
//! created on first use and never recreated once it loaded; what happens
//! after a failed load is governed by [`InitFailurePolicy`].

use tracing::{error, info};

use crate::models::config::{InitFailurePolicy, ModelConfig};
use crate::models::model::{EmbeddingModel, ModelFactory, ModelInfo};
use crate::models::{Embedding, EmbeddingError, EmbeddingResult};
use crate::pipeline::{self, TextFormatter};

/// Builds an uninitialized model from configuration
pub type ModelFactoryFn = Box<dyn Fn(&ModelConfig) -> Box<dyn EmbeddingModel> + Send + Sync>;

/// Main manager for the embedding model
pub struct EmbeddingModelsManager {
    /// Configuration
    config: ModelConfig,
    formatter: TextFormatter,
    factory: ModelFactoryFn,
    /// Loaded model, `None` until the first successful initialization
    model: Option<Box<dyn EmbeddingModel>>,
    /// First load failure, kept only under [`InitFailurePolicy::Cache`]
    cached_failure: Option<String>,
}

impl EmbeddingModelsManager {
    /// Create a manager backed by the ONNX model factory
    pub fn new(config: ModelConfig, formatter: TextFormatter) -> Self {
        Self::with_factory(config, formatter, Box::new(ModelFactory::create_model))
    }

    /// Create a manager with a custom model factory
    pub fn with_factory(config: ModelConfig, formatter: TextFormatter, factory: ModelFactoryFn) -> Self {
        Self {
            config,
            formatter,
            factory,
            model: None,
            cached_failure: None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn formatter(&self) -> &TextFormatter {
        &self.formatter
    }

    /// Check if the model is loaded
    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Information about the loaded model
    pub fn model_info(&self) -> Option<&ModelInfo> {
        self.model.as_deref().map(|model| model.info())
    }

    /// Load the model if it isn't loaded yet. Calling this when ready is a no-op.
    pub async fn initialize(&mut self) -> EmbeddingResult<()> {
        self.ensure_model().await.map(|_| ())
    }

    async fn ensure_model(&mut self) -> EmbeddingResult<&mut (dyn EmbeddingModel + 'static)> {
        if self.model.is_none() {
            let model = self.load().await?;
            self.model = Some(model);
        }

        self.model
            .as_deref_mut()
            .ok_or_else(|| EmbeddingError::ModelNotReady {
                model_name: self.config.model_id.clone(),
            })
    }

    async fn load(&mut self) -> EmbeddingResult<Box<dyn EmbeddingModel>> {
        if let Some(error) = &self.cached_failure {
            return Err(EmbeddingError::InitializationCached { error: error.clone() });
        }

        info!("Initializing embedding model {}...", self.config.model_id);
        let mut model = (self.factory)(&self.config);

        match model.initialize().await {
            Ok(()) => {
                info!("Model initialized: {}", self.config.model_id);
                Ok(model)
            }
            Err(e) => {
                error!("Failed to initialize model {}: {}", self.config.model_id, e);
                if self.config.init_failure_policy == InitFailurePolicy::Cache {
                    self.cached_failure = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Embed a single text
    pub async fn embed_text(&mut self, text: &str, is_query: bool) -> EmbeddingResult<Embedding> {
        let mut embeddings = self.embed_batch(&[text.to_string()], is_query).await?;

        embeddings.pop().ok_or_else(|| EmbeddingError::InferenceError {
            model_name: self.config.model_id.clone(),
            error: "No embedding returned".to_string(),
        })
    }

    /// Embed a batch of texts, preserving input order
    pub async fn embed_batch(&mut self, texts: &[String], is_query: bool) -> EmbeddingResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Err(EmbeddingError::InvalidInput {
                message: "Texts must be a non-empty list of strings".to_string(),
            });
        }

        let formatter = self.formatter.clone();
        let model = self.ensure_model().await?;
        pipeline::embed(model, &formatter, texts, is_query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::{MockCounters, MockEmbeddingModel};
    use std::sync::Arc;

    fn manager(counters: &Arc<MockCounters>, policy: InitFailurePolicy) -> EmbeddingModelsManager {
        let config = ModelConfig {
            init_failure_policy: policy,
            ..ModelConfig::default()
        };
        EmbeddingModelsManager::with_factory(
            config,
            TextFormatter::default(),
            MockEmbeddingModel::factory(Arc::clone(counters)),
        )
    }

    #[tokio::test]
    async fn test_lazy_initialization_happens_once() {
        let counters = Arc::new(MockCounters::default());
        let mut manager = manager(&counters, InitFailurePolicy::Retry);

        assert!(!manager.is_ready());
        assert_eq!(counters.init_attempts(), 0);

        manager.embed_text("first", false).await.unwrap();
        manager.embed_text("second", true).await.unwrap();
        manager.initialize().await.unwrap();

        assert!(manager.is_ready());
        assert_eq!(counters.init_attempts(), 1);
        assert_eq!(manager.model_info().map(|i| i.name.as_str()), Some("mock-encoder"));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let counters = Arc::new(MockCounters::default());
        let mut manager = manager(&counters, InitFailurePolicy::Retry);

        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();

        assert_eq!(counters.init_attempts(), 1);
    }

    #[tokio::test]
    async fn test_retry_policy_reattempts_load() {
        let counters = MockCounters::failing(2);
        let mut manager = manager(&counters, InitFailurePolicy::Retry);

        assert!(manager.initialize().await.is_err());
        assert!(manager.embed_text("hello", false).await.is_err());
        assert_eq!(counters.init_attempts(), 2);

        let embedding = manager.embed_text("hello", false).await.unwrap();
        assert_eq!(embedding.len(), MockEmbeddingModel::DIMENSION);
        assert_eq!(counters.init_attempts(), 3);
    }

    #[tokio::test]
    async fn test_cache_policy_fails_fast() {
        let counters = MockCounters::failing(1);
        let mut manager = manager(&counters, InitFailurePolicy::Cache);

        let first = manager.initialize().await.unwrap_err();
        let second = manager.initialize().await.unwrap_err();

        assert!(first.to_string().contains("weights unavailable"));
        assert!(matches!(second, EmbeddingError::InitializationCached { .. }));
        assert!(second.to_string().contains("weights unavailable"));
        assert_eq!(counters.init_attempts(), 1);
        assert!(!manager.is_ready());
    }

    #[tokio::test]
    async fn test_empty_batch_does_not_load_model() {
        let counters = Arc::new(MockCounters::default());
        let mut manager = manager(&counters, InitFailurePolicy::Retry);

        let err = manager.embed_batch(&[], false).await.unwrap_err();

        assert!(matches!(err, EmbeddingError::InvalidInput { .. }));
        assert_eq!(counters.init_attempts(), 0);
    }

    #[tokio::test]
    async fn test_single_matches_batch_entry() {
        let counters = Arc::new(MockCounters::default());
        let mut manager = manager(&counters, InitFailurePolicy::Retry);
        let texts: Vec<String> = ["a", "b", "c"].iter().map(|t| t.to_string()).collect();

        let batch = manager.embed_batch(&texts, true).await.unwrap();
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(manager.embed_text(text, true).await.unwrap(), batch[i]);
        }
    }
}
