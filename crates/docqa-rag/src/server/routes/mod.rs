//! HTTP route handlers

pub mod chat;
pub mod documents;
pub mod search;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Multipart framing overhead allowed on top of the configured upload limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full route table
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config().server.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/documents/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/documents", get(documents::list_documents))
        .route("/documents/", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:id/chunks", get(documents::get_document_chunks))
        .route("/search/semantic", get(search::semantic))
        .route("/search/keyword", get(search::keyword))
        .route("/search/hybrid", get(search::hybrid))
        .route("/search/stats", get(search::stats))
        .route("/rag/chat", post(chat::rag_chat))
        .route("/rag/health", get(chat::rag_health))
        .with_state(state)
}
