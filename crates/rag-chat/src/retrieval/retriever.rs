//! Similarity search against one embedding model's collection

use std::sync::Arc;
use std::time::Duration;

use crate::error::{with_timeout, Error, Result};
use crate::providers::{Providers, StoreHandle};
use crate::types::{EmbeddingModel, RetrievedContext, ScoredChunk};

/// Embeds queries and fetches the nearest chunks
pub struct Retriever {
    providers: Arc<Providers>,
    store: StoreHandle,
    timeout: Duration,
}

impl Retriever {
    pub fn new(providers: Arc<Providers>, store: StoreHandle, timeout: Duration) -> Self {
        Self {
            providers,
            store,
            timeout,
        }
    }

    /// Top `k` chunks for `query` from the `model` collection, most similar first
    pub async fn retrieve(&self, query: &str, model: EmbeddingModel, k: usize) -> Result<RetrievedContext> {
        let _guard = self.store.shared().await;
        let store = self.store.store();

        if store.count(Some(model)).await? == 0 {
            return Err(self.empty_index(model).await);
        }

        let embedder = self.providers.embedder(model)?;
        let vector = with_timeout("query embedding", self.timeout, embedder.embed(query)).await?;
        if vector.len() != model.dimensions() {
            return Err(Error::ModelMismatch(format!(
                "{} query vector has {} dimensions, expected {}",
                model,
                vector.len(),
                model.dimensions()
            )));
        }

        let results = store.query(model, &vector, k).await?;
        tracing::debug!(
            model = %model,
            k,
            found = results.len(),
            top_similarity = results.first().map(|r| r.similarity),
            "Retrieved chunks"
        );

        Ok(RetrievedContext::new(
            results
                .into_iter()
                .map(|r| ScoredChunk::new(r.chunk, r.similarity))
                .collect(),
        ))
    }

    /// `EmptyIndex` naming the collections that do hold data
    async fn empty_index(&self, model: EmbeddingModel) -> Error {
        let others: Vec<String> = match self.store.store().collections().await {
            Ok(collections) => collections
                .into_iter()
                .filter(|c| c.model != model && c.chunk_count > 0)
                .map(|c| format!("{} ({} chunks)", c.model, c.chunk_count))
                .collect(),
            Err(_) => Vec::new(),
        };

        if others.is_empty() {
            Error::EmptyIndex(format!("no documents indexed with {}", model))
        } else {
            Error::EmptyIndex(format!(
                "no documents indexed with {}; documents exist for {}",
                model,
                others.join(", ")
            ))
        }
    }
}
