//! Application state: the composition root

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::RagEngine;
use crate::ingestion::{IngestionPipeline, UploadCoordinator};
use crate::processing::IngestScheduler;
use crate::providers::{ChatProvider, EmbeddingProvider};
use crate::retrieval::SearchService;
use crate::storage::Store;

/// Shared application state.
///
/// Collaborators are constructed once here and injected; no component holds
/// a global or reaches around the store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    store: Arc<Store>,
    search: Arc<SearchService>,
    rag: Arc<RagEngine>,
    uploads: Arc<UploadCoordinator>,
}

impl AppState {
    /// Wire the service together and start the ingestion workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: RagConfig,
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        let pipeline = Arc::new(IngestionPipeline::new(
            store.clone(),
            embedder.clone(),
            &config.chunking,
        )?);
        let scheduler = IngestScheduler::start(pipeline, &config.processing);

        let search = Arc::new(SearchService::new(store.clone(), embedder));
        let rag = Arc::new(RagEngine::new(
            search.clone(),
            chat,
            config.rag.clone(),
            config.search.clone(),
        ));
        let uploads = Arc::new(UploadCoordinator::new(
            store.clone(),
            scheduler,
            &config.server,
            &config.storage,
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                search,
                rag,
                uploads,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn search(&self) -> &Arc<SearchService> {
        &self.inner.search
    }

    pub fn rag(&self) -> &Arc<RagEngine> {
        &self.inner.rag
    }

    pub fn uploads(&self) -> &Arc<UploadCoordinator> {
        &self.inner.uploads
    }
}
