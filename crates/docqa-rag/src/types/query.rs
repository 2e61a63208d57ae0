//! Request types for search and chat endpoints

use serde::{Deserialize, Serialize};

use crate::providers::chat::ChatMessage;

/// Query parameters for `GET /search/semantic`
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticSearchParams {
    pub query: String,
    pub top_k: Option<usize>,
    pub document_id: Option<String>,
    pub min_similarity: Option<f32>,
}

/// Query parameters for `GET /search/keyword`
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordSearchParams {
    pub query: String,
    pub top_k: Option<usize>,
    pub document_id: Option<String>,
}

/// Query parameters for `GET /search/hybrid`
#[derive(Debug, Clone, Deserialize)]
pub struct HybridSearchParams {
    pub query: String,
    pub top_k: Option<usize>,
    pub document_id: Option<String>,
    pub semantic_weight: Option<f32>,
    pub keyword_weight: Option<f32>,
    pub min_similarity: Option<f32>,
}

/// Query parameters for `GET /documents/`
#[derive(Debug, Clone, Deserialize)]
pub struct ListDocumentsParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
}

/// Request body for `POST /rag/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User question
    pub query: String,
    /// Prior conversation turns, passed through verbatim
    #[serde(default)]
    pub conversation_history: Option<Vec<ChatMessage>>,
    /// Restrict retrieval to one document
    #[serde(default)]
    pub document_id: Option<String>,
    /// Number of chunks to retrieve
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Completion temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum completion tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,
}
