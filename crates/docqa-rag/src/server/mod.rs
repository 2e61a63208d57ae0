//! HTTP server for the document QA service

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::OpenAiClient;
use crate::storage::{build_index, Store};
use state::AppState;

/// Document QA HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Wire the production collaborators and create the server
    pub fn new(config: RagConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.data_dir)?;

        let index = build_index(&config.storage.index);
        let store = Arc::new(Store::open(
            config.storage.database_path(),
            index,
            config.provider.embedding_dimension,
        )?);

        let client = Arc::new(OpenAiClient::new(&config.provider)?);
        let state = AppState::new(config.clone(), store, client.clone(), client)?;

        Ok(Self { config, state })
    }

    /// Create a server over an already-wired state (used by tests)
    pub fn with_state(config: RagConfig, state: AppState) -> Self {
        Self { config, state }
    }

    fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(health_check))
            .merge(routes::router(self.state.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(cors)
    }

    /// Bind and serve until shutdown
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("starting server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::store(format!("server error: {}", e)))?;

        Ok(())
    }

    /// Configured bind address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Liveness probe
async fn health_check() -> &'static str {
    "OK"
}
