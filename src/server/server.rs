//! Stdio Embedding Server
//!
//! Reads one command per line from stdin and writes one JSON response per
//! line to stdout. Lines are handled strictly in order; a long batch blocks
//! the next line until it finishes.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::models::EmbeddingModelsManager;
use crate::pipeline::TextFormatter;
use crate::protocol::Response;
use crate::server::config::ServiceConfig;
use crate::server::dispatcher::CommandDispatcher;

pub struct EmbeddingServer {
    config: Arc<ServiceConfig>,
    dispatcher: CommandDispatcher,
}

impl EmbeddingServer {
    /// Create a new embedding server backed by the ONNX model
    pub fn new(config: ServiceConfig) -> Self {
        let formatter = TextFormatter::new(config.service.query_task_description.clone());
        let manager = EmbeddingModelsManager::new(config.model.clone(), formatter);
        Self::with_manager(config, manager)
    }

    pub fn with_manager(config: ServiceConfig, manager: EmbeddingModelsManager) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: CommandDispatcher::new(manager),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn start(&mut self) -> std::io::Result<()> {
        info!("🚀 Starting embedding service on stdio");

        if self.config.service.eager_initialize {
            if let Err(e) = self.dispatcher.initialize().await {
                warn!("⚠️  Eager model initialization failed, will retry on first command: {}", e);
            }
        }

        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();

        let served = self.serve(stdin, stdout).await?;
        info!("🛑 Input closed after {} requests, shutting down", served);
        Ok(())
    }

    /// Answer every line of `reader` on `writer`, returning the number of lines served.
    ///
    /// Lines are read as raw bytes so invalid UTF-8 gets an `Invalid JSON`
    /// reply instead of ending the loop. Each response is flushed before the
    /// next line is read.
    pub async fn serve<R, W>(&mut self, mut reader: R, mut writer: W) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = Vec::new();
        let mut served = 0usize;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                debug!("Input stream closed");
                break;
            }

            let response = self.dispatcher.handle_line(&line).await;
            let mut payload = encode_response(&response);
            payload.push(b'\n');

            writer.write_all(&payload).await?;
            writer.flush().await?;
            served += 1;
        }

        Ok(served)
    }
}

fn encode_response(response: &Response) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|e| {
        warn!("Failed to serialize response: {}", e);
        br#"{"error": "Failed to serialize response"}"#.to_vec()
    })
}
