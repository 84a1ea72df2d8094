//! Embedding Service Main
//!
//! Entry point for the stdio embedding service. Protocol traffic owns stdout;
//! logs and banners go to stderr.

use embedding_service::{EmbeddingServer, ServiceConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServiceConfig::load()?;

    // Initialize tracing
    let log_level = match config.monitoring.log_level.to_lowercase().as_str() {
        "trace" => "embedding_service=trace,warn",
        "debug" => "embedding_service=debug,warn",
        "warn" => "embedding_service=warn,warn",
        "error" => "embedding_service=error,error",
        _ => "embedding_service=info,warn",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .init();

    eprintln!("Embedding Service started");
    eprintln!("📊 Model: {}", config.model.model_id);
    eprintln!("📁 Model dir: {}", config.model.model_dir.display());
    eprintln!("===============================");

    let mut server = EmbeddingServer::new(config);
    server.start().await?;

    Ok(())
}
