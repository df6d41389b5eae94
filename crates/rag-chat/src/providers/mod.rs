//! Provider abstractions for embeddings, chat completion, re-ranking and vector storage
//!
//! Hosted APIs (OpenAI, Cohere) sit behind the traits so pipeline stages and
//! tests never depend on a concrete backend.

pub mod cohere;
pub mod embedding;
pub mod llm;
pub mod local;
pub mod openai;
pub mod rerank;
pub(crate) mod retry;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use local::InMemoryVectorStore;
pub use rerank::RerankProvider;
pub use vector_store::{CollectionInfo, StoreHandle, VectorSearchResult, VectorStoreProvider};

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::types::{EmbeddingModel, ProviderKind};

use self::cohere::{CohereClient, CohereEmbedder, CohereReranker};
use self::openai::{OpenAiChat, OpenAiClient, OpenAiEmbedder};

/// The external services one service instance talks to
#[derive(Clone)]
pub struct Providers {
    embedders: HashMap<EmbeddingModel, Arc<dyn EmbeddingProvider>>,
    llm: Arc<dyn LlmProvider>,
    reranker: Option<Arc<dyn RerankProvider>>,
}

impl Providers {
    /// Start with a chat provider and no embedders
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            embedders: HashMap::new(),
            llm,
            reranker: None,
        }
    }

    /// Register the embedder for the model it reports
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedders.insert(embedder.model(), embedder);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn RerankProvider>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the OpenAI and Cohere providers from configuration
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let openai = Arc::new(OpenAiClient::new(&config.openai)?);
        let cohere = Arc::new(CohereClient::new(&config.cohere)?);

        let mut providers = Self::new(Arc::new(OpenAiChat::new(
            Arc::clone(&openai),
            config.llm.temperature,
        )));

        for model in EmbeddingModel::ALL {
            let embedder: Arc<dyn EmbeddingProvider> = match model.provider() {
                ProviderKind::OpenAi => Arc::new(OpenAiEmbedder::new(
                    Arc::clone(&openai),
                    model,
                    config.embeddings.batch_size,
                    config.embeddings.timeout(),
                )),
                ProviderKind::Cohere => Arc::new(CohereEmbedder::new(
                    Arc::clone(&cohere),
                    config.embeddings.batch_size,
                    config.embeddings.timeout(),
                )),
            };
            providers = providers.with_embedder(embedder);
        }

        if cohere.has_credentials() {
            providers = providers.with_reranker(Arc::new(CohereReranker::new(
                Arc::clone(&cohere),
                config.rerank.timeout(),
            )));
        } else {
            tracing::warn!("COHERE_API_KEY is not set; external re-ranking and cohere-v3 embeddings are unavailable");
        }

        Ok(providers)
    }

    /// Embedder for `model`
    pub fn embedder(&self, model: EmbeddingModel) -> Result<Arc<dyn EmbeddingProvider>> {
        self.embedders
            .get(&model)
            .cloned()
            .ok_or_else(|| Error::embedding(model.as_str(), "no embedding provider configured for this model"))
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// External re-rank model, if one is configured
    pub fn reranker(&self) -> Option<&Arc<dyn RerankProvider>> {
        self.reranker.as_ref()
    }
}
