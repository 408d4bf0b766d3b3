//! RAG pipeline HTTP server
//!
//! Run with: cargo run -p rag-pipeline --bin rag-pipeline-server [config.toml]

use std::path::PathBuf;

use rag_pipeline::{config::ServiceConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_pipeline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config path: first argument, then RAG_CONFIG
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RAG_CONFIG").ok())
        .map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Semantic chunking model: {}", config.embeddings.semantic_model);
    tracing::info!("  - Reranker: {}", config.reranker.model);
    tracing::info!("  - Model cache: {}", config.embeddings.cache_dir.display());
    tracing::info!(
        "  - Retrieval: top {} -> {} contexts",
        config.retrieval.top_k,
        config.retrieval.context_count
    );

    if std::env::var("OPENAI_API_KEY").is_err() {
        tracing::warn!("OPENAI_API_KEY is not set; only ollama/<model> runs will work");
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  Health: http://{}/health", server.address());
    println!("  Chat:   POST http://{}/chat/completion", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
