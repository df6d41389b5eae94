//! Service facade tying ingestion, querying and database management together

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ModelDefaults, RagConfig};
use crate::error::Result;
use crate::ingestion::{DocumentRegistry, IngestSource, Ingestor};
use crate::pipeline::Pipeline;
use crate::providers::{InMemoryVectorStore, Providers, StoreHandle, VectorStoreProvider};
use crate::types::{
    Answer, ClearResponse, CollectionStatus, EmbeddingModel, QueryRequest, StatusResponse,
    UploadItemResult, UploadResponse,
};

/// File holding the document registry, next to the vector snapshot
const REGISTRY_FILE: &str = "documents.json";

/// One document chat service instance
pub struct RagService {
    store: StoreHandle,
    registry: Arc<DocumentRegistry>,
    ingestor: Ingestor,
    pipeline: Pipeline,
    defaults: ModelDefaults,
    /// Clears in progress; the service is ready when there are none
    clearing: AtomicUsize,
}

/// Marks one clear as in progress until dropped
struct Clearing<'a>(&'a AtomicUsize);

impl<'a> Clearing<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Clearing<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RagService {
    /// Build from configuration with the hosted providers
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let providers = Providers::from_config(config)?;

        let (store, registry): (Arc<dyn VectorStoreProvider>, DocumentRegistry) = if config.vector_db.persist {
            let registry_path = config.vector_db.storage_dir().join(REGISTRY_FILE);
            tracing::info!(
                vectors = %config.vector_db.storage_path.display(),
                registry = %registry_path.display(),
                "Using persistent storage"
            );
            (
                Arc::new(InMemoryVectorStore::open(config.vector_db.storage_path.clone())?),
                DocumentRegistry::open(registry_path),
            )
        } else {
            (Arc::new(InMemoryVectorStore::new()), DocumentRegistry::new())
        };

        Self::new(config, providers, store, registry)
    }

    /// Build from explicit parts
    pub fn new(
        config: &RagConfig,
        providers: Providers,
        store: Arc<dyn VectorStoreProvider>,
        registry: DocumentRegistry,
    ) -> Result<Self> {
        let providers = Arc::new(providers);
        let store = StoreHandle::new(store);
        let registry = Arc::new(registry);

        Ok(Self {
            ingestor: Ingestor::new(config, Arc::clone(&providers), store.clone(), Arc::clone(&registry))?,
            pipeline: Pipeline::new(config, providers, store.clone()),
            store,
            registry,
            defaults: config.model_defaults(),
            clearing: AtomicUsize::new(0),
        })
    }

    /// Ingest uploaded files, one result per file in upload order.
    ///
    /// `model` falls back to the configured default embedding model.
    pub async fn upload(&self, files: Vec<(String, Vec<u8>)>, model: Option<EmbeddingModel>) -> UploadResponse {
        let start = Instant::now();
        let model = self.defaults.embedding(model);
        let sources = files
            .into_iter()
            .map(|(filename, bytes)| IngestSource::File { filename, bytes })
            .collect();

        let results = self.ingestor.ingest_batch(sources, model).await;
        let response = UploadResponse::from_results(results, start.elapsed().as_millis() as u64);
        tracing::info!(
            files = response.results.len(),
            processed = response.files_processed,
            chunks = response.total_chunks,
            model = %model,
            "Upload finished"
        );
        response
    }

    /// Fetch and ingest one web page
    pub async fn upload_url(&self, url: &str, model: Option<EmbeddingModel>) -> UploadItemResult {
        let model = self.defaults.embedding(model);
        self.ingestor
            .ingest_batch(vec![IngestSource::Url(url.to_string())], model)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                UploadItemResult::error(
                    url.to_string(),
                    crate::error::ErrorKind::InternalError,
                    "ingestion produced no result".to_string(),
                )
            })
    }

    /// Answer a question
    pub async fn query(&self, request: &QueryRequest) -> Result<Answer> {
        self.pipeline.run(request).await
    }

    /// Remove every document and chunk.
    ///
    /// Waits for in-flight ingestion and retrieval to release the store.
    pub async fn clear(&self) -> Result<ClearResponse> {
        let _clearing = Clearing::start(&self.clearing);
        let _guard = self.store.exclusive().await;
        let chunks_removed = self.store.store().clear_all().await?;
        let documents_removed = self.registry.clear();

        tracing::info!(documents_removed, chunks_removed, "Database cleared");
        Ok(ClearResponse {
            status: "success".to_string(),
            message: format!(
                "Removed {} documents and {} chunks",
                documents_removed, chunks_removed
            ),
            documents_removed,
            chunks_removed,
        })
    }

    /// False while any clear is waiting or running
    pub fn is_ready(&self) -> bool {
        self.clearing.load(Ordering::SeqCst) == 0
    }

    /// Counts per collection
    ///
    /// Waits behind a pending clear so counts and readiness come from one snapshot.
    pub async fn status(&self) -> Result<StatusResponse> {
        let _guard = self.store.shared().await;
        let ready = self.is_ready();
        let store = self.store.store();
        let collections = store
            .collections()
            .await?
            .into_iter()
            .map(|c| CollectionStatus {
                embedding_model: c.model,
                dimensions: c.dimensions,
                chunk_count: c.chunk_count,
            })
            .collect();

        Ok(StatusResponse {
            document_count: self.registry.len(),
            chunk_count: store.count(None).await?,
            ready,
            collections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_clears_stay_unready_until_last_ends() {
        let counter = AtomicUsize::new(0);
        let first = Clearing::start(&counter);
        let second = Clearing::start(&counter);
        drop(first);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(second);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
