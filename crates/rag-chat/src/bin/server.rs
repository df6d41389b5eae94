//! Document chat server binary
//!
//! Run with: cargo run -p rag-chat --bin rag-chat-server -- --config rag.toml

use clap::Parser;
use rag_chat::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rag-chat-server", version, about = "Document chat with cited answers")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config and RAG_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port (overrides config and RAG_PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_chat=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Default embedding model: {}", config.embeddings.default_model);
    tracing::info!("  - Default chat model: {}", config.llm.default_model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!(
        "  - Vector snapshot: {} (persist: {})",
        config.vector_db.storage_path.display(),
        config.vector_db.persist
    );

    if config.openai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; OpenAI embeddings and chat will fail");
    }
    if config.cohere.api_key.is_none() {
        tracing::warn!("COHERE_API_KEY is not set; external re-ranking and Cohere embeddings are unavailable");
    }

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
