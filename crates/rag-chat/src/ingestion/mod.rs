//! Document ingestion: parse, chunk, embed and index files and web pages
//!
//! Each item is prepared (parsed, chunked, embedded) under a deadline and then
//! committed to the vector store in a single upsert. A failed commit removes
//! whatever was written for the document, so an item is either fully indexed
//! or absent.

mod chunker;
mod fetcher;
mod parser;
mod registry;

pub use chunker::TextChunker;
pub use fetcher::{extract_page, UrlFetcher};
pub use parser::{FileParser, PageContent, ParagraphMark, ParsedDocument, DOCX_CHARS_PER_PAGE};
pub use registry::{DocumentRegistry, Reservation};

use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{with_timeout, Error, Result};
use crate::providers::{Providers, StoreHandle};
use crate::types::{Chunk, Document, EmbeddingModel, UploadItemResult};

/// Something to ingest
#[derive(Debug, Clone)]
pub enum IngestSource {
    /// Uploaded file contents
    File { filename: String, bytes: Vec<u8> },
    /// Web page to fetch
    Url(String),
}

impl IngestSource {
    /// File name or URL, for reporting
    pub fn label(&self) -> &str {
        match self {
            Self::File { filename, .. } => filename,
            Self::Url(url) => url,
        }
    }
}

/// Result of ingesting one item
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Document indexed with this many chunks
    Indexed { document: Document, chunks: u32 },
    /// Same content already indexed under the model
    Duplicate { existing: Document },
}

impl IngestOutcome {
    /// Per-item report for upload responses
    pub fn into_item_result(self, label: String) -> UploadItemResult {
        match self {
            Self::Indexed { document, chunks } => {
                UploadItemResult::success(label, document.id, chunks, document.embedding_model)
            }
            Self::Duplicate { existing } => UploadItemResult::skipped(
                label,
                format!(
                    "Duplicate content already indexed as '{}' ({})",
                    existing.title, existing.id
                ),
            ),
        }
    }
}

/// A document ready to commit
struct Prepared {
    document: Document,
    chunks: Vec<Chunk>,
}

/// Document ingestor
pub struct Ingestor {
    providers: Arc<Providers>,
    store: StoreHandle,
    registry: Arc<DocumentRegistry>,
    chunker: TextChunker,
    fetcher: UrlFetcher,
    item_timeout: Duration,
}

impl Ingestor {
    pub fn new(
        config: &RagConfig,
        providers: Arc<Providers>,
        store: StoreHandle,
        registry: Arc<DocumentRegistry>,
    ) -> Result<Self> {
        Ok(Self {
            providers,
            store,
            registry,
            chunker: TextChunker::from_config(&config.chunking),
            fetcher: UrlFetcher::new(config.processing.url_timeout(), config.processing.max_url_chars)?,
            item_timeout: config.processing.file_timeout(),
        })
    }

    /// Ingest one item into the collection for `model`
    pub async fn ingest(&self, source: IngestSource, model: EmbeddingModel) -> Result<IngestOutcome> {
        let label = source.label().to_string();
        let start = std::time::Instant::now();

        let prepared = with_timeout(
            &format!("ingest {}", label),
            self.item_timeout,
            self.prepare(source, model),
        )
        .await?;

        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(existing) => return Ok(IngestOutcome::Duplicate { existing }),
        };

        let outcome = self.commit(prepared, model).await?;
        if let IngestOutcome::Indexed { document, chunks } = &outcome {
            tracing::info!(
                source = %label,
                document_id = %document.id,
                model = %model,
                chunks,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Document indexed"
            );
        }
        Ok(outcome)
    }

    /// Ingest each item in order; one failure never affects the others
    pub async fn ingest_batch(
        &self,
        sources: Vec<IngestSource>,
        model: EmbeddingModel,
    ) -> Vec<UploadItemResult> {
        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            let label = source.label().to_string();
            let result = match self.ingest(source, model).await {
                Ok(outcome) => outcome.into_item_result(label),
                Err(e) => {
                    tracing::warn!(source = %label, error = %e, "Ingestion failed");
                    UploadItemResult::error(label, e.kind(), e.to_string())
                }
            };
            results.push(result);
        }
        results
    }

    /// Parse, chunk and embed. `Err(existing)` in the inner result means duplicate.
    async fn prepare(
        &self,
        source: IngestSource,
        model: EmbeddingModel,
    ) -> Result<std::result::Result<Prepared, Document>> {
        let parsed = match source {
            IngestSource::Url(url) => self.fetcher.fetch(url.trim()).await?,
            IngestSource::File { filename, bytes } => {
                // Fail fast on the extension before handing bytes to a worker thread
                crate::types::FileType::from_filename(&filename)?;
                tokio::task::spawn_blocking(move || FileParser::parse(&filename, &bytes))
                    .await
                    .map_err(|e| Error::internal(format!("parser task failed: {}", e)))??
            }
        };

        if let Some(existing) = self.registry.find_duplicate(model, &parsed.content_hash) {
            return Ok(Err(existing));
        }

        let source_name = parsed.url.clone().unwrap_or_else(|| parsed.title.clone());
        let mut document = Document::new(
            parsed.title.clone(),
            source_name,
            parsed.file_type,
            model,
            parsed.content_hash.clone(),
        );
        document.total_pages = parsed.total_pages;

        let mut chunks = self.chunker.chunk_document(&document, &parsed);
        if chunks.is_empty() {
            return Err(Error::EmptyDocument(document.source));
        }
        document.total_chunks = chunks.len() as u32;

        self.embed_chunks(&mut chunks, model).await?;
        Ok(Ok(Prepared { document, chunks }))
    }

    /// Attach embeddings, checking count and dimension
    async fn embed_chunks(&self, chunks: &mut [Chunk], model: EmbeddingModel) -> Result<()> {
        let embedder = self.providers.embedder(model)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(
                embedder.name(),
                format!("expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            ));
        }

        let expected = model.dimensions();
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            if embedding.len() != expected {
                return Err(Error::ModelMismatch(format!(
                    "{} produces {}-dimensional vectors, provider returned {}",
                    model,
                    expected,
                    embedding.len()
                )));
            }
            chunk.embedding = embedding;
        }
        Ok(())
    }

    /// Write one document under the shared store guard, rolling back on failure
    async fn commit(&self, prepared: Prepared, model: EmbeddingModel) -> Result<IngestOutcome> {
        let _guard = self.store.shared().await;

        // A concurrent upload of the same content may have claimed it meanwhile
        let reservation = match self.registry.reserve(&prepared.document) {
            Ok(reservation) => reservation,
            Err(existing) => return Ok(IngestOutcome::Duplicate { existing }),
        };

        let store = self.store.store();
        if let Err(e) = store.upsert(model, &prepared.chunks).await {
            match store.delete_by_document(&prepared.document.id).await {
                Ok(removed) if removed > 0 => {
                    tracing::warn!(document_id = %prepared.document.id, removed, "Rolled back partial write")
                }
                Ok(_) => {}
                Err(cleanup) => {
                    tracing::error!(document_id = %prepared.document.id, error = %cleanup, "Rollback failed")
                }
            }
            return Err(e);
        }

        let chunks = prepared.chunks.len() as u32;
        reservation.commit(prepared.document.clone());
        Ok(IngestOutcome::Indexed {
            document: prepared.document,
            chunks,
        })
    }
}
