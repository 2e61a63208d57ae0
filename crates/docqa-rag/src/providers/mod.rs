//! Provider abstractions for embeddings and chat completions
//!
//! Trait-based collaborators injected by the composition root, so the
//! pipeline, search, and RAG layers never talk to a concrete backend.

pub mod chat;
pub mod embedding;
pub mod openai;

pub use chat::{ChatMessage, ChatProvider, Completion, Role};
pub use embedding::EmbeddingProvider;
pub use openai::OpenAiClient;
