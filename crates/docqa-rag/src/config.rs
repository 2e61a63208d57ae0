//! Configuration for the document QA service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Embedding and chat provider configuration
    pub provider: ProviderConfig,
    /// Text chunking configuration
    pub chunking: ChunkingConfig,
    /// Search configuration
    pub search: SearchConfig,
    /// RAG orchestration configuration
    pub rag: RagOptions,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Background processing configuration
    pub processing: ProcessingConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            rag: RagOptions::default(),
            storage: StorageConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl RagConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.server.host = env_or("API_HOST", config.server.host);
        config.server.port = env_parse("API_PORT", config.server.port);
        config.server.max_upload_bytes = env_parse("MAX_UPLOAD_SIZE", config.server.max_upload_bytes);
        if let Ok(raw) = std::env::var("ALLOWED_EXTENSIONS") {
            config.server.allowed_extensions = raw
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
        }

        config.provider.base_url = env_or("OPENAI_BASE_URL", config.provider.base_url);
        config.provider.api_key = env_or("OPENAI_API_KEY", config.provider.api_key);
        config.provider.chat_model = env_or("OPENAI_MODEL", config.provider.chat_model);
        config.provider.embedding_model =
            env_or("OPENAI_EMBEDDING_MODEL", config.provider.embedding_model);
        config.provider.embedding_dimension =
            env_parse("EMBEDDING_DIMENSION", config.provider.embedding_dimension);
        config.provider.embed_batch_max = env_parse("EMBED_BATCH_MAX", config.provider.embed_batch_max);
        config.provider.timeout_secs = env_parse("PROVIDER_TIMEOUT_SECS", config.provider.timeout_secs);
        config.provider.max_retries = env_parse("PROVIDER_MAX_RETRIES", config.provider.max_retries);

        config.chunking.chunk_size = env_parse("CHUNK_SIZE", config.chunking.chunk_size);
        config.chunking.chunk_overlap = env_parse("CHUNK_OVERLAP", config.chunking.chunk_overlap);

        config.search.top_k_default = env_parse("TOP_K_RESULTS", config.search.top_k_default);
        config.search.semantic_weight = env_parse("SEMANTIC_WEIGHT", config.search.semantic_weight);
        config.search.keyword_weight = env_parse("KEYWORD_WEIGHT", config.search.keyword_weight);

        config.rag.top_k_default = env_parse("RAG_TOP_K", config.rag.top_k_default);
        config.rag.max_context_chars = env_parse("MAX_CONTEXT_CHARS", config.rag.max_context_chars);

        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        config.storage.index.kind = env_parse("VECTOR_INDEX", config.storage.index.kind);
        config.storage.index.hnsw_m = env_parse("HNSW_M", config.storage.index.hnsw_m);
        config.storage.index.hnsw_ef_construction =
            env_parse("HNSW_EF_CONSTRUCTION", config.storage.index.hnsw_ef_construction);
        config.storage.index.hnsw_ef_search =
            env_parse("HNSW_EF_SEARCH", config.storage.index.hnsw_ef_search);

        if let Ok(raw) = std::env::var("INGEST_WORKERS") {
            config.processing.worker_count = raw.parse().ok();
        }

        config
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Maximum upload size in bytes
    pub max_upload_bytes: usize,
    /// Accepted file extensions (lowercase, no dot)
    pub allowed_extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_extensions: vec!["txt".to_string(), "pdf".to_string()],
        }
    }
}

/// External provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Chat completion model
    pub chat_model: String,
    /// Embedding model
    pub embedding_model: String,
    /// Embedding vector dimension
    pub embedding_dimension: usize,
    /// Maximum strings per embedding request
    pub embed_batch_max: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            embed_batch_max: 100,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Overlapping characters carried between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results
    pub top_k_default: usize,
    /// Default semantic weight for hybrid fusion
    pub semantic_weight: f32,
    /// Default keyword weight for hybrid fusion
    pub keyword_weight: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k_default: 5,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
        }
    }
}

/// RAG orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagOptions {
    /// Default number of chunks to retrieve
    pub top_k_default: usize,
    /// Maximum characters of assembled context
    pub max_context_chars: usize,
    /// Default completion temperature
    pub temperature_default: f32,
    /// Default maximum completion tokens
    pub max_tokens_default: u32,
    /// Answer returned when retrieval produces no results
    pub no_context_answer: String,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            top_k_default: 8,
            max_context_chars: 6000,
            temperature_default: 0.7,
            max_tokens_default: 500,
            no_context_answer: "There are no indexed documents available to answer that. \
                Please upload documents first."
                .to_string(),
        }
    }
}

/// Which vector index backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact linear scan
    Flat,
    /// Small-world graph (approximate)
    Hnsw,
}

impl FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "hnsw" => Ok(Self::Hnsw),
            other => Err(format!("unknown index kind: {}", other)),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index implementation
    pub kind: IndexKind,
    /// HNSW connections per layer
    pub hnsw_m: usize,
    /// HNSW construction beam width
    pub hnsw_ef_construction: usize,
    /// HNSW search beam width
    pub hnsw_ef_search: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::Hnsw,
            hnsw_m: 16,
            hnsw_ef_construction: 64,
            hnsw_ef_search: 64,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the database and uploaded files
    pub data_dir: PathBuf,
    /// Vector index configuration
    pub index: IndexConfig,
}

impl StorageConfig {
    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("docqa.db")
    }

    /// Directory holding uploaded file bytes
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa-rag");

        Self {
            data_dir,
            index: IndexConfig::default(),
        }
    }
}

/// Background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of concurrent ingestion workers (auto-detected when unset)
    pub worker_count: Option<usize>,
    /// Depth of the ingestion queue
    pub queue_depth: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            queue_depth: 256,
        }
    }
}

impl ProcessingConfig {
    /// Effective worker count
    pub fn workers(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}
