//! Vector store provider trait for storing and searching embeddings
//!
//! Chunks live in one collection per embedding model. A collection records the
//! dimension of the first vector written to it and refuses anything else.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Chunk, EmbeddingModel};

/// Search result from vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is more similar)
    pub similarity: f32,
}

/// Size of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub model: EmbeddingModel,
    pub dimensions: usize,
    pub chunk_count: usize,
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `InMemoryVectorStore`: cosine search over in-process collections with JSON snapshots
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert or replace chunks in the collection for `model`.
    ///
    /// Fails with `ModelMismatch` if a chunk was embedded with another model or
    /// its vector length differs from the collection's.
    async fn upsert(&self, model: EmbeddingModel, chunks: &[Chunk]) -> Result<()>;

    /// Nearest `top_k` chunks to `vector`, most similar first
    async fn query(
        &self,
        model: EmbeddingModel,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Delete all chunks for a document, in every collection
    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize>;

    /// Remove every chunk from every collection; returns the number removed
    async fn clear_all(&self) -> Result<usize>;

    /// Chunks in one collection, or in all of them when `model` is `None`
    async fn count(&self, model: Option<EmbeddingModel>) -> Result<usize>;

    /// Non-empty collections
    async fn collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Shared store access with an exclusive mode for destructive operations.
///
/// Ingestion and retrieval hold a shared guard while they touch the store;
/// `clear_all` waits for them to finish and blocks new ones until it is done.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn VectorStoreProvider>,
    gate: Arc<RwLock<()>>,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn VectorStoreProvider>) -> Self {
        Self {
            store,
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Underlying store, for calls made while holding a guard
    pub fn store(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.store
    }

    /// Shared access; many holders at once
    pub async fn shared(&self) -> OwnedRwLockReadGuard<()> {
        Arc::clone(&self.gate).read_owned().await
    }

    /// Exclusive access; waits for every shared holder to release
    pub async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }
}
