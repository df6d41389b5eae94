//! In-process vector store with per-model collections
//!
//! Exact cosine search over every chunk in a collection. State can be
//! snapshotted to a JSON file after each change and reloaded on start.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, EmbeddingModel};

use super::vector_store::{CollectionInfo, VectorSearchResult, VectorStoreProvider};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Collection {
    dimensions: usize,
    chunks: HashMap<Uuid, Chunk>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotCollection {
    model: EmbeddingModel,
    dimensions: usize,
    chunks: Vec<Chunk>,
}

type Collections = HashMap<EmbeddingModel, Collection>;

/// In-memory vector store
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<Collections>>,
    snapshot: Option<Arc<Snapshot>>,
}

/// Snapshot file. Writes are serialized and each one captures the state at
/// the time it holds the writer lock, so the file never lags a finished write.
struct Snapshot {
    path: PathBuf,
    writer: Mutex<()>,
}

impl Snapshot {
    fn write(&self, collections: &RwLock<Collections>) -> Result<()> {
        let _writer = self.writer.lock();

        let json = {
            let collections = collections.read();
            let mut snapshot: Vec<SnapshotCollection> = collections
                .iter()
                .filter(|(_, c)| !c.chunks.is_empty())
                .map(|(model, c)| {
                    let mut chunks: Vec<Chunk> = c.chunks.values().cloned().collect();
                    chunks.sort_by_key(|ch| (ch.document_id, ch.chunk_index));
                    SnapshotCollection {
                        model: *model,
                        dimensions: c.dimensions,
                        chunks,
                    }
                })
                .collect();
            snapshot.sort_by_key(|c| c.model.as_str());
            serde_json::to_string(&snapshot)?
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl InMemoryVectorStore {
    /// Create an empty store without persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file, loading it if present
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let collections = if path.exists() {
            let loaded = Self::load_snapshot(&path)?;
            let total: usize = loaded.values().map(|c| c.chunks.len()).sum();
            tracing::info!(path = %path.display(), chunks = total, "Loaded vector snapshot");
            loaded
        } else {
            HashMap::new()
        };

        Ok(Self {
            collections: Arc::new(RwLock::new(collections)),
            snapshot: Some(Arc::new(Snapshot {
                path,
                writer: Mutex::new(()),
            })),
        })
    }

    fn load_snapshot(path: &Path) -> Result<Collections> {
        let data = std::fs::read_to_string(path)?;
        let snapshot: Vec<SnapshotCollection> = serde_json::from_str(&data)?;
        Ok(snapshot
            .into_iter()
            .map(|c| {
                let chunks = c.chunks.into_iter().map(|chunk| (chunk.id, chunk)).collect();
                (
                    c.model,
                    Collection {
                        dimensions: c.dimensions,
                        chunks,
                    },
                )
            })
            .collect())
    }

    /// Write the current state to the snapshot file, if one is configured
    async fn persist(&self) -> Result<()> {
        let Some(snapshot) = self.snapshot.clone() else {
            return Ok(());
        };
        let collections = Arc::clone(&self.collections);

        tokio::task::spawn_blocking(move || snapshot.write(&collections))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    /// Undo an upsert: restore replaced chunks, drop new ones
    fn restore(&self, model: EmbeddingModel, previous: Vec<(Uuid, Option<Chunk>)>) {
        let mut collections = self.collections.write();
        if let Some(collection) = collections.get_mut(&model) {
            for (id, chunk) in previous {
                match chunk {
                    Some(chunk) => {
                        collection.chunks.insert(id, chunk);
                    }
                    None => {
                        collection.chunks.remove(&id);
                    }
                }
            }
        }
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn upsert(&self, model: EmbeddingModel, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let previous = {
            let mut collections = self.collections.write();
            let existing_dims = collections
                .get(&model)
                .filter(|c| !c.chunks.is_empty())
                .map(|c| c.dimensions);
            let dims = existing_dims.unwrap_or(chunks[0].embedding.len());

            // Validate the whole batch before touching the collection
            for chunk in chunks {
                if chunk.source.embedding_model != model {
                    return Err(Error::ModelMismatch(format!(
                        "chunk {} was embedded with '{}' but targets the '{}' collection",
                        chunk.id, chunk.source.embedding_model, model
                    )));
                }
                if chunk.embedding.is_empty() {
                    return Err(Error::vector_store(format!("chunk {} has no embedding", chunk.id)));
                }
                if chunk.embedding.len() != dims {
                    return Err(Error::ModelMismatch(format!(
                        "vector length {} does not match the '{}' collection ({} dims)",
                        chunk.embedding.len(),
                        model,
                        dims
                    )));
                }
            }

            let collection = collections.entry(model).or_default();
            collection.dimensions = dims;
            chunks
                .iter()
                .map(|chunk| (chunk.id, collection.chunks.insert(chunk.id, chunk.clone())))
                .collect::<Vec<_>>()
        };

        // A failed upsert leaves the collection as it was
        if let Err(e) = self.persist().await {
            tracing::error!(collection = %model, error = %e, "Snapshot write failed, reverting upsert");
            self.restore(model, previous);
            return Err(e);
        }

        tracing::debug!(collection = %model, count = chunks.len(), "Upserted chunks");
        Ok(())
    }

    async fn query(
        &self,
        model: EmbeddingModel,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        let collections = self.collections.read();
        let Some(collection) = collections.get(&model).filter(|c| !c.chunks.is_empty()) else {
            return Ok(Vec::new());
        };

        if vector.len() != collection.dimensions {
            return Err(Error::ModelMismatch(format!(
                "query vector has {} dims but the '{}' collection holds {}-dim vectors",
                vector.len(),
                model,
                collection.dimensions
            )));
        }

        let mut results: Vec<VectorSearchResult> = collection
            .chunks
            .values()
            .map(|chunk| VectorSearchResult {
                similarity: cosine_similarity(vector, &chunk.embedding),
                chunk: chunk.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let removed = {
            let mut collections = self.collections.write();
            let mut removed = 0;
            for collection in collections.values_mut() {
                let before = collection.chunks.len();
                collection.chunks.retain(|_, c| c.document_id != *document_id);
                removed += before - collection.chunks.len();
            }
            removed
        };

        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn clear_all(&self) -> Result<usize> {
        let removed = {
            let mut collections = self.collections.write();
            let removed = collections.values().map(|c| c.chunks.len()).sum();
            collections.clear();
            removed
        };

        self.persist().await?;
        Ok(removed)
    }

    async fn count(&self, model: Option<EmbeddingModel>) -> Result<usize> {
        let collections = self.collections.read();
        Ok(match model {
            Some(model) => collections.get(&model).map(|c| c.chunks.len()).unwrap_or(0),
            None => collections.values().map(|c| c.chunks.len()).sum(),
        })
    }

    async fn collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read();
        let mut infos: Vec<CollectionInfo> = collections
            .iter()
            .filter(|(_, c)| !c.chunks.is_empty())
            .map(|(model, c)| CollectionInfo {
                model: *model,
                dimensions: c.dimensions,
                chunk_count: c.chunks.len(),
            })
            .collect();
        infos.sort_by_key(|i| i.model.as_str());
        Ok(infos)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkSource, FileType};

    fn chunk(doc: Uuid, index: u32, model: EmbeddingModel, embedding: Vec<f32>) -> Chunk {
        let source = ChunkSource {
            title: "policy.txt".into(),
            path: "policy.txt".into(),
            file_type: FileType::Txt,
            page_number: Some(1),
            page_estimated: false,
            paragraph_number: None,
            url: None,
            embedding_model: model,
        };
        let mut c = Chunk::new(doc, format!("chunk {}", index), source, 0, 10, index);
        c.embedding = embedding;
        c
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        let model = EmbeddingModel::TextEmbedding3Small;
        let doc = Uuid::new_v4();
        store
            .upsert(
                model,
                &[
                    chunk(doc, 0, model, vec![0.0, 1.0, 0.0]),
                    chunk(doc, 1, model, vec![1.0, 0.0, 0.0]),
                    chunk(doc, 2, model, vec![0.7, 0.7, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.query(model, &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_index, 1);
        assert_eq!(results[1].chunk.chunk_index, 2);
    }

    #[tokio::test]
    async fn test_collections_are_isolated_per_model() {
        let store = InMemoryVectorStore::new();
        let small = EmbeddingModel::TextEmbedding3Small;
        let cohere = EmbeddingModel::CohereV3;
        let doc = Uuid::new_v4();
        store.upsert(small, &[chunk(doc, 0, small, vec![1.0, 0.0])]).await.unwrap();
        store
            .upsert(cohere, &[chunk(doc, 0, cohere, vec![1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.count(Some(small)).await.unwrap(), 1);
        assert_eq!(store.count(Some(cohere)).await.unwrap(), 1);
        assert_eq!(store.count(None).await.unwrap(), 2);
        assert!(store
            .query(EmbeddingModel::TextEmbedding3Large, &[1.0], 3)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = InMemoryVectorStore::new();
        let model = EmbeddingModel::TextEmbedding3Small;
        let doc = Uuid::new_v4();
        store.upsert(model, &[chunk(doc, 0, model, vec![1.0, 0.0])]).await.unwrap();

        let err = store
            .upsert(model, &[chunk(doc, 1, model, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelMismatch(_)));

        let err = store.query(model, &[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, Error::ModelMismatch(_)));
        assert_eq!(store.count(Some(model)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chunk_tagged_with_other_model_rejected() {
        let store = InMemoryVectorStore::new();
        let doc = Uuid::new_v4();
        let stray = chunk(doc, 0, EmbeddingModel::CohereV3, vec![1.0, 0.0]);
        let err = store
            .upsert(EmbeddingModel::TextEmbedding3Small, &[stray])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelMismatch(_)));
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_then_count_is_zero() {
        let store = InMemoryVectorStore::new();
        let model = EmbeddingModel::TextEmbedding3Small;
        let doc = Uuid::new_v4();
        store
            .upsert(model, &[chunk(doc, 0, model, vec![1.0]), chunk(doc, 1, model, vec![0.5])])
            .await
            .unwrap();

        assert_eq!(store.clear_all().await.unwrap(), 2);
        assert_eq!(store.count(None).await.unwrap(), 0);
        assert!(store.collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_document() {
        let store = InMemoryVectorStore::new();
        let model = EmbeddingModel::TextEmbedding3Small;
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        store
            .upsert(model, &[chunk(keep, 0, model, vec![1.0]), chunk(drop, 0, model, vec![1.0])])
            .await
            .unwrap();

        assert_eq!(store.delete_by_document(&drop).await.unwrap(), 1);
        assert_eq!(store.count(Some(model)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let model = EmbeddingModel::CohereV3;
        let doc = Uuid::new_v4();

        {
            let store = InMemoryVectorStore::open(&path).unwrap();
            store.upsert(model, &[chunk(doc, 0, model, vec![0.1, 0.2])]).await.unwrap();
        }

        let reopened = InMemoryVectorStore::open(&path).unwrap();
        assert_eq!(reopened.count(Some(model)).await.unwrap(), 1);
        let infos = reopened.collections().await.unwrap();
        assert_eq!(infos[0].dimensions, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_upserts_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let store = std::sync::Arc::new(InMemoryVectorStore::open(&path).unwrap());
        let model = EmbeddingModel::TextEmbedding3Small;

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    let doc = Uuid::new_v4();
                    store
                        .upsert(model, &[chunk(doc, 0, model, vec![1.0, i as f32])])
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.count(Some(model)).await.unwrap(), 64);
        let reopened = InMemoryVectorStore::open(&path).unwrap();
        assert_eq!(reopened.count(Some(model)).await.unwrap(), 64);
    }

    #[tokio::test]
    async fn test_failed_snapshot_reverts_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let store = InMemoryVectorStore::open(&path).unwrap();
        let model = EmbeddingModel::TextEmbedding3Small;
        let kept = chunk(Uuid::new_v4(), 0, model, vec![1.0, 0.0]);
        store.upsert(model, &[kept.clone()]).await.unwrap();

        // The snapshot can no longer be replaced by a file
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let mut replaced = kept.clone();
        replaced.content = "rewritten".into();
        let fresh = chunk(Uuid::new_v4(), 0, model, vec![0.0, 1.0]);
        assert!(store.upsert(model, &[replaced, fresh]).await.is_err());

        assert_eq!(store.count(Some(model)).await.unwrap(), 1);
        let results = store.query(model, &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results[0].chunk.content, kept.content);
    }
}
