//! Document and chunk types with source tracking for citations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use super::model::EmbeddingModel;

/// Supported source types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Legacy Word document (.doc), read as best-effort text
    Doc,
    /// Plain text file
    Txt,
    /// HTML file (.html, .htm)
    Html,
    /// Web page fetched by URL
    Url,
}

/// Extensions accepted for uploads
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["pdf", "docx", "doc", "txt", "html", "htm"];

impl FileType {
    /// Detect file type from an extension, without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "txt" => Some(Self::Txt),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }

    /// Detect file type from an uploaded file name
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        Self::from_extension(ext).ok_or_else(|| {
            let shown = if ext.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{}", ext.to_lowercase())
            };
            Error::UnsupportedFormat(format!(
                "{}. Supported types: {}",
                shown,
                SUPPORTED_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{}", e))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Doc => "Word Document (.doc)",
            Self::Txt => "Text File",
            Self::Html => "HTML",
            Self::Url => "Web Page",
        }
    }
}

/// A document that has been ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Human-readable title (HTML title or file name)
    pub title: String,
    /// File name or URL the document was read from
    pub source: String,
    /// File type
    pub file_type: FileType,
    /// Model whose collection holds this document's chunks
    pub embedding_model: EmbeddingModel,
    /// Hash of the extracted text
    pub content_hash: String,
    /// Total number of pages (if applicable)
    pub total_pages: Option<u32>,
    /// Total number of chunks created
    pub total_chunks: u32,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    pub fn new(
        title: String,
        source: String,
        file_type: FileType,
        embedding_model: EmbeddingModel,
        content_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            source,
            file_type,
            embedding_model,
            content_hash,
            total_pages: None,
            total_chunks: 0,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// Source information for a chunk (used for citations)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Document title
    pub title: String,
    /// File name or URL
    pub path: String,
    /// File type
    pub file_type: FileType,
    /// Page number (1-indexed)
    pub page_number: Option<u32>,
    /// True when the page number is derived from text length rather than layout
    #[serde(default)]
    pub page_estimated: bool,
    /// Paragraph number (DOCX)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_number: Option<u32>,
    /// Origin URL for fetched pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Embedding model the chunk was indexed with
    pub embedding_model: EmbeddingModel,
}

impl ChunkSource {
    /// Format source for display
    pub fn format_citation(&self) -> String {
        let mut parts = vec![self.title.clone()];

        if let Some(page) = self.page_number {
            if self.page_estimated {
                parts.push(format!("Page ~{}", page));
            } else {
                parts.push(format!("Page {}", page));
            }
        }

        parts.join(", ")
    }
}

/// A text chunk with its embedding and source information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content
    pub content: String,
    /// Embedding vector
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Source information for citations
    pub source: ChunkSource,
    /// Character offset in the extracted document text
    pub char_start: usize,
    pub char_end: usize,
    /// Chunk index within the document
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new chunk without an embedding
    pub fn new(
        document_id: Uuid,
        content: String,
        source: ChunkSource,
        char_start: usize,
        char_end: usize,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            embedding: Vec::new(),
            source,
            char_start,
            char_end,
            chunk_index,
        }
    }
}
