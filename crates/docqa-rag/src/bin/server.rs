//! Document QA server binary
//!
//! Run with: cargo run -p docqa-rag --bin docqa-rag-server

use docqa_rag::config::RagConfig;
use docqa_rag::providers::{EmbeddingProvider, OpenAiClient};
use docqa_rag::server::RagServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::from_env();

    tracing::info!("configuration loaded");
    tracing::info!("  - chat model: {}", config.provider.chat_model);
    tracing::info!("  - embedding model: {}", config.provider.embedding_model);
    tracing::info!("  - embedding dimension: {}", config.provider.embedding_dimension);
    tracing::info!("  - chunk size / overlap: {} / {}", config.chunking.chunk_size, config.chunking.chunk_overlap);
    tracing::info!("  - data dir: {}", config.storage.data_dir.display());

    if config.provider.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; provider calls will fail");
    } else {
        let probe = OpenAiClient::new(&config.provider)?;
        match probe.health_check().await {
            Ok(true) => tracing::info!("provider reachable at {}", config.provider.base_url),
            _ => tracing::warn!("provider not reachable at {}", config.provider.base_url),
        }
    }

    let server = RagServer::new(config)?;
    tracing::info!("listening on {}", server.address());
    server.start().await?;

    Ok(())
}
