//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::EmbeddingModel;

/// Trait for generating text embeddings with one fixed model
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI embeddings API (text-embedding-3-small/large, ada-002)
/// - `CohereEmbedder`: Cohere embed API (embed-english-v3.0)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a search query
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed document chunks (batch)
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Model this provider embeds with
    fn model(&self) -> EmbeddingModel;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize {
        self.model().dimensions()
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}
