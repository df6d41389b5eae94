//! Cohere providers for embeddings and re-ranking

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::CohereConfig;
use crate::error::{Error, Result};
use crate::types::EmbeddingModel;

use super::embedding::EmbeddingProvider;
use super::rerank::RerankProvider;
use super::retry::JsonClient;

const PROVIDER: &str = "cohere";

/// Cohere API client with automatic retry
pub struct CohereClient {
    api: JsonClient,
    rerank_model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body).ok().map(|e| e.message)
}

impl CohereClient {
    /// Create a new client from configuration
    pub fn new(config: &CohereConfig) -> Result<Self> {
        Ok(Self {
            api: JsonClient::new(
                PROVIDER,
                "COHERE_API_KEY",
                config.api_key.clone(),
                &config.base_url,
                config.max_retries,
                error_detail,
            )?,
            rerank_model: config.rerank_model.clone(),
        })
    }

    /// Whether an API key is configured
    pub fn has_credentials(&self) -> bool {
        self.api.has_credentials()
    }

    /// Embed texts; `input_type` is "search_query" or "search_document"
    pub async fn embed_texts(
        &self,
        model: EmbeddingModel,
        texts: &[String],
        input_type: &str,
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, model = %model, batch_size = texts.len(), input_type, "embedding batch");

        let request = EmbedRequest {
            model: model.api_name(),
            texts,
            input_type,
        };
        let response: EmbedResponse = self
            .api
            .post_json("/embed", &request, timeout)
            .await
            .map_err(|e| Error::embedding(PROVIDER, e.message))?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::embedding(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), response.embeddings.len()),
            ));
        }
        Ok(response.embeddings)
    }

    /// Relevance of each document to the query, in input order
    pub async fn rerank(&self, query: &str, documents: &[String], timeout: Duration) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, model = %self.rerank_model, documents = documents.len(), "rerank");

        let request = RerankRequest {
            model: &self.rerank_model,
            query,
            documents,
            top_n: documents.len(),
        };
        let response: RerankResponse = self
            .api
            .post_json("/rerank", &request, timeout)
            .await
            .map_err(|e| Error::rerank(PROVIDER, e.message))?;

        let mut scores = vec![None; documents.len()];
        for result in response.results {
            match scores.get_mut(result.index) {
                Some(slot) => *slot = Some(result.relevance_score),
                None => {
                    return Err(Error::rerank(
                        PROVIDER,
                        format!("result index {} out of range", result.index),
                    ))
                }
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.ok_or_else(|| Error::rerank(PROVIDER, format!("no score for document {}", i))))
            .collect()
    }
}

/// Cohere embedding provider (embed-english-v3.0)
pub struct CohereEmbedder {
    client: Arc<CohereClient>,
    batch_size: usize,
    timeout: Duration,
}

impl CohereEmbedder {
    pub fn new(client: Arc<CohereClient>, batch_size: usize, timeout: Duration) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            timeout,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        self.client
            .embed_texts(EmbeddingModel::CohereV3, &texts, "search_query", self.timeout)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(
                self.client
                    .embed_texts(EmbeddingModel::CohereV3, batch, "search_document", self.timeout)
                    .await?,
            );
        }
        Ok(embeddings)
    }

    fn model(&self) -> EmbeddingModel {
        EmbeddingModel::CohereV3
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// Cohere rerank provider
pub struct CohereReranker {
    client: Arc<CohereClient>,
    timeout: Duration,
}

impl CohereReranker {
    pub fn new(client: Arc<CohereClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl RerankProvider for CohereReranker {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        self.client.rerank(query, texts, self.timeout).await
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
