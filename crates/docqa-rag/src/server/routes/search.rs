//! Search endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::Result;
use crate::retrieval::RankedChunk;
use crate::server::state::AppState;
use crate::types::query::{HybridSearchParams, KeywordSearchParams, SemanticSearchParams};
use crate::types::response::{
    FusionWeights, HybridHit, HybridSearchResponse, KeywordHit, KeywordSearchResponse,
    SearchStatsResponse, SemanticHit, SemanticSearchResponse,
};

/// GET /search/semantic - vector similarity search
pub async fn semantic(
    State(state): State<AppState>,
    Query(params): Query<SemanticSearchParams>,
) -> Result<Json<SemanticSearchResponse>> {
    let top_k = params
        .top_k
        .unwrap_or(state.config().search.top_k_default);

    let results = state
        .search()
        .semantic(
            &params.query,
            top_k,
            params.document_id.as_deref(),
            params.min_similarity.unwrap_or(0.0),
        )
        .await?;

    Ok(Json(SemanticSearchResponse {
        query: params.query,
        results: results.iter().map(semantic_hit).collect(),
    }))
}

/// GET /search/keyword - substring frequency search
pub async fn keyword(
    State(state): State<AppState>,
    Query(params): Query<KeywordSearchParams>,
) -> Result<Json<KeywordSearchResponse>> {
    let top_k = params
        .top_k
        .unwrap_or(state.config().search.top_k_default);

    let results = state
        .search()
        .keyword(&params.query, top_k, params.document_id.as_deref())
        .await?;

    Ok(Json(KeywordSearchResponse {
        query: params.query,
        results: results.iter().map(keyword_hit).collect(),
    }))
}

/// GET /search/hybrid - weighted fusion of semantic and keyword search
pub async fn hybrid(
    State(state): State<AppState>,
    Query(params): Query<HybridSearchParams>,
) -> Result<Json<HybridSearchResponse>> {
    let config = &state.config().search;
    let top_k = params.top_k.unwrap_or(config.top_k_default);
    let semantic_weight = params.semantic_weight.unwrap_or(config.semantic_weight);
    let keyword_weight = params.keyword_weight.unwrap_or(config.keyword_weight);

    let results = state
        .search()
        .hybrid(
            &params.query,
            top_k,
            params.document_id.as_deref(),
            semantic_weight,
            keyword_weight,
            params.min_similarity.unwrap_or(0.0),
        )
        .await?;

    // Echo the weights as used in fusion (normalized to sum to 1)
    let total = semantic_weight + keyword_weight;
    Ok(Json(HybridSearchResponse {
        query: params.query,
        results: results.iter().map(hybrid_hit).collect(),
        weights: FusionWeights {
            semantic_weight: semantic_weight / total,
            keyword_weight: keyword_weight / total,
        },
    }))
}

/// GET /search/stats - searchable corpus statistics
pub async fn stats(State(state): State<AppState>) -> Result<Json<SearchStatsResponse>> {
    let stats = state.search().statistics()?;
    Ok(Json(stats_response(stats)))
}

pub(crate) fn stats_response(
    stats: crate::retrieval::SearchStatistics,
) -> SearchStatsResponse {
    SearchStatsResponse {
        total_documents: stats.total_documents,
        total_chunks: stats.total_chunks,
        chunks_with_embeddings: stats.chunks_with_embeddings,
        searchable_percentage: stats.searchable_percentage,
        average_chunks_per_document: stats.average_chunks_per_document,
    }
}

fn semantic_hit(result: &RankedChunk) -> SemanticHit {
    SemanticHit {
        chunk_id: result.chunk.chunk_id.clone(),
        document_id: result.chunk.document_id.clone(),
        document_name: result.document_name.clone(),
        chunk_index: result.chunk.chunk_index,
        text: result.chunk.text.clone(),
        similarity_score: result.score,
    }
}

fn keyword_hit(result: &RankedChunk) -> KeywordHit {
    KeywordHit {
        chunk_id: result.chunk.chunk_id.clone(),
        document_id: result.chunk.document_id.clone(),
        document_name: result.document_name.clone(),
        chunk_index: result.chunk.chunk_index,
        text: result.chunk.text.clone(),
        relevance_score: result.score,
        match_count: result.match_count.unwrap_or(0),
    }
}

fn hybrid_hit(result: &RankedChunk) -> HybridHit {
    HybridHit {
        chunk_id: result.chunk.chunk_id.clone(),
        document_id: result.chunk.document_id.clone(),
        document_name: result.document_name.clone(),
        chunk_index: result.chunk.chunk_index,
        text: result.chunk.text.clone(),
        combined_score: result.score,
        semantic_score: result.semantic_score.unwrap_or(0.0),
        keyword_score: result.keyword_score.unwrap_or(0.0),
    }
}
