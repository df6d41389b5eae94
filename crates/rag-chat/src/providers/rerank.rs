//! Rerank provider trait for cross-encoder relevance scoring

use async_trait::async_trait;

use crate::error::Result;

/// Trait for scoring passages against a query
///
/// Implementations:
/// - `CohereReranker`: Cohere rerank API (rerank-english-v3.0)
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Score each text against the query.
    ///
    /// The returned vector has one score per input text, in input order.
    /// Higher is more relevant.
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
