//! docqa-rag: document question answering with retrieval-augmented generation
//!
//! Uploads are parsed, chunked into overlapping passages, embedded, and
//! persisted with vector-similarity indexing. A search layer ranks chunks
//! under semantic, keyword, and hybrid modes, and a RAG layer turns a
//! question into a grounded answer with explicit source citations.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{Chunk, Document, DocumentStatus, FileType};
