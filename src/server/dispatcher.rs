//! Command dispatch for one input line
//!
//! Every failure is turned into an error response here; nothing escapes a
//! single line.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::models::EmbeddingModelsManager;
use crate::protocol::{Command, CommandError, Response};

pub struct CommandDispatcher {
    manager: EmbeddingModelsManager,
}

impl CommandDispatcher {
    pub fn new(manager: EmbeddingModelsManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &EmbeddingModelsManager {
        &self.manager
    }

    /// Load the model ahead of the first command
    pub async fn initialize(&mut self) -> Result<(), CommandError> {
        self.manager.initialize().await?;
        Ok(())
    }

    /// Handle one raw input line and produce exactly one response
    pub async fn handle_line(&mut self, line: &[u8]) -> Response {
        let outcome = AssertUnwindSafe(self.process(line)).catch_unwind().await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                match &e {
                    CommandError::Model(_) => error!("Command failed: {}", e),
                    _ => debug!("Rejected line: {}", e),
                }
                e.into()
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Panic while handling line: {}", message);
                CommandError::Internal(message).into()
            }
        }
    }

    async fn process(&mut self, line: &[u8]) -> Result<Response, CommandError> {
        let command = Command::parse(line).map_err(|e| {
            if matches!(e, CommandError::Parse) {
                warn!("Received malformed JSON ({} bytes)", line.len());
            }
            e
        })?;

        debug!("Dispatching {}", command.name());
        self.execute(command).await
    }

    pub async fn execute(&mut self, command: Command) -> Result<Response, CommandError> {
        match command {
            Command::Initialize => {
                self.manager.initialize().await?;
                Ok(Response::initialized())
            }
            Command::GenerateEmbedding { text, is_query } => {
                let embedding = self.manager.embed_text(&text, is_query).await?;
                Ok(Response::Embedding { embedding })
            }
            Command::GenerateEmbeddings { texts, is_query } => {
                let embeddings = self.manager.embed_batch(&texts, is_query).await?;
                Ok(Response::Embeddings { embeddings })
            }
        }
    }
}
