//! Response types for queries, uploads and database management

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use super::context::ScoredChunk;
use super::document::FileType;
use super::model::{ChatModel, EmbeddingModel, RerankMethod};

/// Citation from a source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Chunk ID
    pub chunk_id: Uuid,
    /// Document ID
    pub document_id: Uuid,
    /// Document title
    pub title: String,
    /// File name or URL
    pub file_path: String,
    /// File type
    pub file_type: FileType,
    /// Page number (if applicable)
    pub page_number: Option<u32>,
    /// Page number was estimated from text length
    pub page_estimated: bool,
    /// Paragraph number (DOCX)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_number: Option<u32>,
    /// Origin URL for fetched pages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Snippet of the text the model saw
    pub snippet: String,
    /// Similarity score
    pub similarity_score: f32,
    /// Rerank score (if reranking ran)
    pub rerank_score: Option<f32>,
}

impl Citation {
    /// Create a citation from a context entry
    pub fn from_scored(scored: &ScoredChunk, snippet: String) -> Self {
        let chunk = &scored.chunk;
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            title: chunk.source.title.clone(),
            file_path: chunk.source.path.clone(),
            file_type: chunk.source.file_type,
            page_number: chunk.source.page_number,
            page_estimated: chunk.source.page_estimated,
            paragraph_number: chunk.source.paragraph_number,
            url: chunk.source.url.clone(),
            snippet,
            similarity_score: scored.similarity,
            rerank_score: scored.rerank_score,
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        match self.page_number {
            Some(page) => format!("[Source: {}, Page {}]", self.title, page),
            None => format!("[Source: {}]", self.title),
        }
    }
}

/// A non-fatal stage failure the answer was produced around
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Degradation {
    /// Stage that failed
    pub stage: String,
    /// Error kind
    pub kind: ErrorKind,
    /// Human-readable reason
    pub message: String,
}

/// Answer to a query
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generated answer text
    pub answer: String,
    /// Citations, one per chunk the model saw, in context order
    pub citations: Vec<Citation>,
    pub model_used: ChatModel,
    pub embedding_model_used: EmbeddingModel,
    /// K requested by the caller
    pub chunk_count: usize,
    /// Chunks actually given to the generator
    pub chunks_used: usize,
    pub rerank_method: RerankMethod,
    /// Whether compression shortened the context
    pub compression_used: bool,
    /// "english" or "vietnamese"
    pub language_detected: String,
    /// Optional stages that failed and were skipped
    pub degradations: Vec<Degradation>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl Answer {
    /// Whether every optional stage ran cleanly
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Outcome of one upload item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Skipped,
    Error,
}

/// Per-item upload result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadItemResult {
    /// File name or URL
    pub filename: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_added: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<EmbeddingModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadItemResult {
    pub fn success(filename: String, document_id: Uuid, chunks: u32, model: EmbeddingModel) -> Self {
        Self {
            filename,
            status: ItemStatus::Success,
            document_id: Some(document_id),
            chunks_added: Some(chunks),
            embedding_model: Some(model),
            error_kind: None,
            message: None,
        }
    }

    pub fn skipped(filename: String, reason: String) -> Self {
        Self {
            filename,
            status: ItemStatus::Skipped,
            document_id: None,
            chunks_added: Some(0),
            embedding_model: None,
            error_kind: None,
            message: Some(reason),
        }
    }

    pub fn error(filename: String, kind: ErrorKind, message: String) -> Self {
        Self {
            filename,
            status: ItemStatus::Error,
            document_id: None,
            chunks_added: None,
            embedding_model: None,
            error_kind: Some(kind),
            message: Some(message),
        }
    }
}

/// Response to a batch upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always "completed"; per-item outcomes are in `results`
    pub status: String,
    /// Items that were ingested successfully
    pub files_processed: usize,
    pub total_chunks: u32,
    pub results: Vec<UploadItemResult>,
    pub processing_time_ms: u64,
}

impl UploadResponse {
    pub fn from_results(results: Vec<UploadItemResult>, processing_time_ms: u64) -> Self {
        let files_processed = results
            .iter()
            .filter(|r| r.status == ItemStatus::Success)
            .count();
        let total_chunks = results
            .iter()
            .filter(|r| r.status == ItemStatus::Success)
            .filter_map(|r| r.chunks_added)
            .sum();

        Self {
            status: "completed".to_string(),
            files_processed,
            total_chunks,
            results,
            processing_time_ms,
        }
    }
}

/// Response to clearing the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub status: String,
    pub message: String,
    pub documents_removed: usize,
    pub chunks_removed: usize,
}

/// Chunk count for one embedding model's collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub embedding_model: EmbeddingModel,
    pub dimensions: usize,
    pub chunk_count: usize,
}

/// Database status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub document_count: usize,
    pub chunk_count: usize,
    pub ready: bool,
    pub collections: Vec<CollectionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_counts_only_successes() {
        let results = vec![
            UploadItemResult::success("a.pdf".into(), Uuid::new_v4(), 4, EmbeddingModel::default()),
            UploadItemResult::error(
                "b.xyz".into(),
                ErrorKind::UnsupportedFormat,
                "Unsupported format: .xyz".into(),
            ),
            UploadItemResult::skipped("c.txt".into(), "duplicate".into()),
            UploadItemResult::success("d.txt".into(), Uuid::new_v4(), 2, EmbeddingModel::default()),
        ];
        let response = UploadResponse::from_results(results, 12);
        assert_eq!(response.status, "completed");
        assert_eq!(response.files_processed, 2);
        assert_eq!(response.total_chunks, 6);
        assert_eq!(response.results.len(), 4);
    }

    #[test]
    fn test_item_status_serializes_lowercase() {
        let item = UploadItemResult::error("x.bin".into(), ErrorKind::UnsupportedFormat, "nope".into());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_kind"], "unsupported_format");
        assert!(json.get("chunks_added").is_none());
    }
}
