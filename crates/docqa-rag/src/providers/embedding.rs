//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Produces fixed-dimension dense vectors for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order and length.
    ///
    /// Implementations partition the input to respect provider limits; a
    /// failure on any partition fails the whole call with no partial result.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }
        Ok(embeddings)
    }

    /// Vector dimension produced by this provider
    fn dimensions(&self) -> usize;

    /// Whether the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
