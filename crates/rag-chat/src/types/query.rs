//! Request types for queries and URL ingestion

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use super::model::{ChatModel, EmbeddingModel, RerankMethod};

/// Upper bound on chunks a single query may request
pub const MAX_CHUNK_COUNT: usize = 20;

/// Query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub query: String,
    /// Chat model used for generation (and LLM-based re-ranking);
    /// the configured default when absent
    #[serde(default, alias = "model", skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<ChatModel>,
    /// Embedding model selecting the collection to search; the configured
    /// default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<EmbeddingModel>,
    /// Number of chunks to hand to the generator (K)
    #[serde(default = "default_chunk_count")]
    pub chunk_count: usize,
    /// Re-ranking strategy
    #[serde(default, alias = "reranker_type")]
    pub rerank_method: RerankMethod,
    /// Run the context compression stage
    #[serde(default = "default_use_compression")]
    pub use_compression: bool,
}

fn default_chunk_count() -> usize {
    3
}

fn default_use_compression() -> bool {
    true
}

impl QueryRequest {
    /// Create a query with default settings
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            chat_model: None,
            embedding_model: None,
            chunk_count: default_chunk_count(),
            rerank_method: RerankMethod::default(),
            use_compression: default_use_compression(),
        }
    }

    pub fn with_chunk_count(mut self, k: usize) -> Self {
        self.chunk_count = k;
        self
    }

    pub fn with_chat_model(mut self, model: ChatModel) -> Self {
        self.chat_model = Some(model);
        self
    }

    pub fn with_embedding_model(mut self, model: EmbeddingModel) -> Self {
        self.embedding_model = Some(model);
        self
    }

    pub fn with_rerank(mut self, method: RerankMethod) -> Self {
        self.rerank_method = method;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    /// Reject requests the pipeline cannot serve
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidRequest("query must not be empty".to_string()));
        }
        if self.chunk_count == 0 || self.chunk_count > MAX_CHUNK_COUNT {
            return Err(Error::InvalidRequest(format!(
                "chunk_count must be between 1 and {}, got {}",
                MAX_CHUNK_COUNT, self.chunk_count
            )));
        }
        Ok(())
    }
}

/// Request to ingest a web page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrlRequest {
    pub url: String,
    #[serde(default)]
    pub embedding_model: Option<EmbeddingModel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "What is the refund window?"}"#).unwrap();
        assert_eq!(req.chat_model, None);
        assert_eq!(req.embedding_model, None);
        assert_eq!(req.chunk_count, 3);
        assert_eq!(req.rerank_method, RerankMethod::None);
        assert!(req.use_compression);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_legacy_field_names() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"query": "q", "model": "gpt-4", "reranker_type": "cohere", "chunk_count": 5}"#,
        )
        .unwrap();
        assert_eq!(req.chat_model, Some(ChatModel::Gpt4));
        assert_eq!(req.rerank_method, RerankMethod::External);
        assert_eq!(req.chunk_count, 5);
    }

    #[test]
    fn test_unknown_embedding_model_rejected() {
        let res: std::result::Result<QueryRequest, _> =
            serde_json::from_str(r#"{"query": "q", "embedding_model": "word2vec"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_validation() {
        assert!(QueryRequest::new("   ").validate().is_err());
        assert!(QueryRequest::new("q").with_chunk_count(0).validate().is_err());
        assert!(QueryRequest::new("q").with_chunk_count(21).validate().is_err());
        assert!(QueryRequest::new("q").with_chunk_count(20).validate().is_ok());
    }
}
