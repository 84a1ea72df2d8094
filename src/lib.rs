//! Embedding Service Library
//!
//! Line-oriented stdin/stdout service that turns text into unit-norm
//! embedding vectors with a pretrained encoder.

pub mod models;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod protocol;
pub mod server;

// Re-exports
pub use models::{Embedding, EmbeddingError, EmbeddingModelsManager};
pub use pipeline::{embed, format_text_for_embedding, TextFormatter};
pub use protocol::{Command, CommandError, Response};
pub use server::{EmbeddingServer, ServiceConfig};
