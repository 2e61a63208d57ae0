//! RAG chat endpoints

use axum::{extract::State, Json};
use chrono::Utc;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::query::ChatRequest;
use crate::types::response::{ChatResponse, RagHealthResponse};

use super::search::stats_response;

/// POST /rag/chat - grounded question answering with citations
pub async fn rag_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let answer = state.rag().answer(&request).await?;

    Ok(Json(ChatResponse {
        success: true,
        query: request.query,
        answer: answer.answer,
        sources: answer.sources,
        context_used: answer.context_used,
        model: answer.model,
        tokens_used: answer.tokens_used,
        timestamp: Utc::now(),
    }))
}

/// GET /rag/health - readiness of the RAG subsystem
pub async fn rag_health(State(state): State<AppState>) -> Result<Json<RagHealthResponse>> {
    let database_connection = state.store().ping().is_ok();
    let provider_configured = !state.config().provider.api_key.is_empty();

    let stats = state.search().statistics()?;
    let embedding_ready = stats.chunks_with_embeddings > 0;

    let ready = database_connection
        && provider_configured
        && stats.total_documents > 0
        && embedding_ready;

    Ok(Json(RagHealthResponse {
        status: if ready { "healthy" } else { "not_ready" }.to_string(),
        database_connection,
        provider_configured,
        embedding_ready,
        statistics: stats_response(stats),
        timestamp: Utc::now(),
    }))
}
