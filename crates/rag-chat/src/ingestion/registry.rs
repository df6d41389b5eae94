//! Registry of ingested documents, persisted beside the vector snapshot

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

use crate::types::{Document, EmbeddingModel};

type ContentKey = (EmbeddingModel, String);

/// Ingested documents by id
#[derive(Default)]
pub struct DocumentRegistry {
    documents: DashMap<Uuid, Document>,
    /// Indexed and in-flight documents by (model, content hash)
    contents: DashMap<ContentKey, Document>,
    path: Option<PathBuf>,
    writer: Mutex<()>,
}

fn content_key(doc: &Document) -> ContentKey {
    (doc.embedding_model, doc.content_hash.clone())
}

impl DocumentRegistry {
    /// In-memory registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry persisted to `path`, loading existing entries
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let documents = Self::load_documents(&path);
        tracing::info!("Loaded {} documents from registry", documents.len());
        let contents = documents
            .iter()
            .map(|e| (content_key(e.value()), e.value().clone()))
            .collect();
        Self {
            documents,
            contents,
            path: Some(path),
            writer: Mutex::new(()),
        }
    }

    /// Load documents from disk
    fn load_documents(path: &PathBuf) -> DashMap<Uuid, Document> {
        let documents = DashMap::new();
        if !path.exists() {
            return documents;
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<Document>>(&content) {
                Ok(docs) => {
                    for doc in docs {
                        documents.insert(doc.id, doc);
                    }
                }
                Err(e) => tracing::warn!("Failed to parse {}: {}", path.display(), e),
            },
            Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
        }

        documents
    }

    /// Save documents to disk
    fn save_documents(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let _writer = self.writer.lock();

        let mut docs: Vec<Document> = self.documents.iter().map(|e| e.value().clone()).collect();
        docs.sort_by_key(|d| d.ingested_at);

        let result = serde_json::to_string_pretty(&docs)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                let tmp = path.with_extension("json.tmp");
                fs::write(&tmp, content).map_err(|e| e.to_string())?;
                fs::rename(&tmp, path).map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            tracing::error!("Failed to save {}: {}", path.display(), e);
        }
    }

    /// Claim `doc`'s content under its model before writing it to the store.
    ///
    /// Fails with the document already holding the claim, indexed or in flight.
    pub fn reserve(&self, doc: &Document) -> std::result::Result<Reservation<'_>, Document> {
        let key = content_key(doc);
        match self.contents.entry(key.clone()) {
            Entry::Occupied(existing) => Err(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(doc.clone());
                Ok(Reservation {
                    registry: self,
                    key,
                    id: doc.id,
                    committed: false,
                })
            }
        }
    }

    /// Record an indexed document
    pub fn insert(&self, doc: Document) {
        self.contents.insert(content_key(&doc), doc.clone());
        self.documents.insert(doc.id, doc);
        self.save_documents();
    }

    /// Document with the same extracted text already indexed or being indexed under `model`
    pub fn find_duplicate(&self, model: EmbeddingModel, content_hash: &str) -> Option<Document> {
        self.contents
            .get(&(model, content_hash.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Remove every document; returns how many there were
    pub fn clear(&self) -> usize {
        let count = self.documents.len();
        self.documents.clear();
        self.contents.clear();
        self.save_documents();
        count
    }
}

/// Claim on a document's content; released on drop unless committed
#[must_use]
pub struct Reservation<'a> {
    registry: &'a DocumentRegistry,
    key: ContentKey,
    id: Uuid,
    committed: bool,
}

impl std::fmt::Debug for Reservation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl Reservation<'_> {
    /// Record the document as indexed
    pub fn commit(mut self, doc: Document) {
        self.committed = true;
        self.registry.insert(doc);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry
                .contents
                .remove_if(&self.key, |_, held| held.id == self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;

    fn doc(hash: &str, model: EmbeddingModel) -> Document {
        Document::new("a.txt".into(), "a.txt".into(), FileType::Txt, model, hash.into())
    }

    #[test]
    fn test_duplicate_is_per_model() {
        let registry = DocumentRegistry::new();
        registry.insert(doc("abc", EmbeddingModel::TextEmbedding3Small));

        assert!(registry.find_duplicate(EmbeddingModel::TextEmbedding3Small, "abc").is_some());
        assert!(registry.find_duplicate(EmbeddingModel::CohereV3, "abc").is_none());
        assert!(registry.find_duplicate(EmbeddingModel::TextEmbedding3Small, "def").is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.json");

        let registry = DocumentRegistry::open(&path);
        let d = doc("abc", EmbeddingModel::default());
        let id = d.id;
        registry.insert(d);
        drop(registry);

        let reopened = DocumentRegistry::open(&path);
        assert_eq!(reopened.len(), 1);
        let found = reopened.find_duplicate(EmbeddingModel::default(), "abc").unwrap();
        assert_eq!(found.id, id);

        assert_eq!(reopened.clear(), 1);
        assert!(DocumentRegistry::open(&path).is_empty());
    }

    #[test]
    fn test_reserve_admits_one_claim_per_content() {
        let registry = DocumentRegistry::new();
        let first = doc("abc", EmbeddingModel::default());
        let second = doc("abc", EmbeddingModel::default());

        let claim = registry.reserve(&first).unwrap();
        let held = registry.reserve(&second).unwrap_err();
        assert_eq!(held.id, first.id);
        assert!(registry.is_empty());

        // An abandoned claim frees the content
        drop(claim);
        let claim = registry.reserve(&second).unwrap();
        claim.commit(second.clone());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.reserve(&first).unwrap_err().id, second.id);
    }

    #[test]
    fn test_concurrent_reservations_of_same_content() {
        let registry = std::sync::Arc::new(DocumentRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = std::sync::Arc::clone(&registry);
                std::thread::spawn(move || {
                    let doc = doc("same", EmbeddingModel::default());
                    match registry.reserve(&doc) {
                        Ok(claim) => {
                            claim.commit(doc);
                            true
                        }
                        Err(_) => false,
                    }
                })
            })
            .collect();
        let granted = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(granted, 1);
        assert_eq!(registry.len(), 1);
    }
}
