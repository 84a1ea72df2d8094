//! Server module

pub mod config;
pub mod dispatcher;
pub mod server;

pub use config::ServiceConfig;
pub use dispatcher::CommandDispatcher;
pub use server::EmbeddingServer;
