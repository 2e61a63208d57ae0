//! Response types for the HTTP surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{Chunk, Document, DocumentStatus, FileType};

/// Document metadata as exposed by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub file_hash: String,
    pub character_count: Option<u64>,
    pub word_count: Option<u64>,
    pub page_count: Option<u32>,
    pub chunk_count: u32,
    pub processing_status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Document> for DocumentMetadata {
    fn from(doc: &Document) -> Self {
        Self {
            document_id: doc.document_id.clone(),
            filename: doc.filename.clone(),
            file_type: doc.file_type,
            file_size: doc.file_size,
            file_hash: doc.file_hash.clone(),
            character_count: doc.character_count,
            word_count: doc.word_count,
            page_count: doc.page_count,
            chunk_count: doc.chunk_count,
            processing_status: doc.status,
            error_message: doc.error_message.clone(),
            uploaded_at: doc.uploaded_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Response for `POST /documents/upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub document_id: String,
    pub filename: String,
    pub size: u64,
    pub hash: String,
    pub chunks_created: u32,
    pub metadata: DocumentMetadata,
}

/// Response for `GET /documents/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentMetadata>,
    pub total_count: u64,
}

/// Chunk summary for `GET /documents/{id}/chunks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub chunk_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub has_vector: bool,
}

impl From<&Chunk> for ChunkSummary {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            has_vector: chunk.embedding.is_some(),
        }
    }
}

/// Response for `GET /documents/{id}/chunks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunksResponse {
    pub document_id: String,
    pub chunks: Vec<ChunkSummary>,
}

/// Response for `DELETE /documents/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub document_id: String,
    pub deleted_chunks: usize,
}

/// A semantic search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticHit {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: u32,
    pub text: String,
    pub similarity_score: f32,
}

/// Response for `GET /search/semantic`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSearchResponse {
    pub query: String,
    pub results: Vec<SemanticHit>,
}

/// A keyword search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordHit {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: u32,
    pub text: String,
    pub relevance_score: f32,
    pub match_count: usize,
}

/// Response for `GET /search/keyword`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSearchResponse {
    pub query: String,
    pub results: Vec<KeywordHit>,
}

/// A hybrid search hit with the fused and component scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridHit {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: u32,
    pub text: String,
    pub combined_score: f32,
    pub semantic_score: f32,
    pub keyword_score: f32,
}

/// Normalized fusion weights echoed back to the caller
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
}

/// Response for `GET /search/hybrid`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSearchResponse {
    pub query: String,
    pub results: Vec<HybridHit>,
    pub weights: FusionWeights,
}

/// Response for `GET /search/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStatsResponse {
    pub total_documents: u64,
    pub total_chunks: u64,
    pub chunks_with_embeddings: u64,
    pub searchable_percentage: f64,
    pub average_chunks_per_document: f64,
}

/// A cited source in a chat answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub index: usize,
    pub document_id: String,
    pub document_filename: String,
    pub chunk_index: u32,
    pub relevance_score: f32,
    pub text_preview: String,
}

/// Response for `POST /rag/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub query: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub context_used: usize,
    pub model: String,
    pub tokens_used: u32,
    pub timestamp: DateTime<Utc>,
}

/// Response for `GET /rag/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagHealthResponse {
    pub status: String,
    pub database_connection: bool,
    pub provider_configured: bool,
    pub embedding_ready: bool,
    pub statistics: SearchStatsResponse,
    pub timestamp: DateTime<Utc>,
}
