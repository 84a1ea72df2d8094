//! Line Protocol for the Embedding Service
//!
//! Newline-delimited JSON over stdin/stdout. Each input line is one command
//! object, each output line is one response object.
//!
//! Requests:
//! - `{"command": "initialize"}`
//! - `{"command": "generate_embedding", "text": "...", "is_query": false}`
//! - `{"command": "generate_embeddings", "texts": ["...", "..."], "is_query": true}`
//!
//! Responses:
//! - `{"status": "initialized"}`
//! - `{"embedding": [0.1, 0.2, ...]}`
//! - `{"embeddings": [[0.1, ...], [0.3, ...]]}`
//! - `{"error": "..."}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Embedding, EmbeddingError};

pub const CMD_INITIALIZE: &str = "initialize";
pub const CMD_GENERATE_EMBEDDING: &str = "generate_embedding";
pub const CMD_GENERATE_EMBEDDINGS: &str = "generate_embeddings";

/// Status reported by a successful `initialize`
pub const STATUS_INITIALIZED: &str = "initialized";

/// Errors raised while handling one input line
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid JSON")]
    Parse,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Model(#[from] EmbeddingError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommandError {
    pub fn no_text() -> Self {
        CommandError::InvalidInput("No text provided".to_string())
    }

    pub fn no_texts() -> Self {
        CommandError::InvalidInput("No texts provided or invalid format".to_string())
    }
}

/// A validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize,
    GenerateEmbedding { text: String, is_query: bool },
    GenerateEmbeddings { texts: Vec<String>, is_query: bool },
}

impl Command {
    /// Parse one input line
    pub fn parse(line: &[u8]) -> Result<Self, CommandError> {
        let value: Value = serde_json::from_slice(line).map_err(|_| CommandError::Parse)?;
        Self::from_json(value)
    }

    /// Validate a decoded JSON object into a command
    ///
    /// Payload fields are only checked for the command that uses them, so
    /// `{"command": "initialize", "text": 5}` is still a valid initialize.
    pub fn from_json(value: Value) -> Result<Self, CommandError> {
        let Value::Object(mut fields) = value else {
            return Err(CommandError::InvalidInput(
                "Invalid command format: expected a JSON object".to_string(),
            ));
        };

        let command = match fields.remove("command") {
            Some(Value::String(name)) => name,
            Some(other) => return Err(CommandError::UnknownCommand(other.to_string())),
            None => return Err(CommandError::UnknownCommand(Value::Null.to_string())),
        };

        match command.as_str() {
            CMD_INITIALIZE => Ok(Command::Initialize),
            CMD_GENERATE_EMBEDDING => {
                let text = match fields.remove("text") {
                    Some(Value::String(text)) if !text.is_empty() => text,
                    _ => return Err(CommandError::no_text()),
                };
                let is_query = parse_is_query(fields.remove("is_query"))?;
                Ok(Command::GenerateEmbedding { text, is_query })
            }
            CMD_GENERATE_EMBEDDINGS => {
                let texts = match fields.remove("texts") {
                    Some(Value::Array(items)) if !items.is_empty() => items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(text) => Ok(text),
                            _ => Err(CommandError::no_texts()),
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => return Err(CommandError::no_texts()),
                };
                let is_query = parse_is_query(fields.remove("is_query"))?;
                Ok(Command::GenerateEmbeddings { texts, is_query })
            }
            _ => Err(CommandError::UnknownCommand(command)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize => CMD_INITIALIZE,
            Command::GenerateEmbedding { .. } => CMD_GENERATE_EMBEDDING,
            Command::GenerateEmbeddings { .. } => CMD_GENERATE_EMBEDDINGS,
        }
    }
}

fn parse_is_query(value: Option<Value>) -> Result<bool, CommandError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(flag),
        Some(_) => Err(CommandError::InvalidInput(
            "Invalid is_query: expected a boolean".to_string(),
        )),
    }
}

/// One response line. Exactly one of these shapes is written per input line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Embedding { embedding: Embedding },
    Embeddings { embeddings: Vec<Embedding> },
    Status { status: String },
    Error { error: String },
}

impl Response {
    pub fn initialized() -> Self {
        Response::Status {
            status: STATUS_INITIALIZED.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { error: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<CommandError> for Response {
    fn from(error: CommandError) -> Self {
        Response::error(error.to_string())
    }
}
