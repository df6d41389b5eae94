//! Error types for the document chat service
//!
//! Every failure carries a kind, reported to clients and recorded in
//! degradations.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// File extension or URL scheme the ingestor cannot read
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Vectors written or queried under a model that does not own the collection
    #[error("Embedding model mismatch: {0}")]
    ModelMismatch(String),

    /// Embedding provider failed or returned malformed vectors
    #[error("Embedding provider '{provider}' failed: {message}")]
    EmbeddingProvider { provider: String, message: String },

    /// No chunks stored for the requested embedding model
    #[error("Index is empty: {0}")]
    EmptyIndex(String),

    /// External re-rank model failed
    #[error("Rerank provider '{provider}' failed: {message}")]
    RerankProvider { provider: String, message: String },

    /// LLM reply could not be turned into relevance scores
    #[error("Could not parse model output: {0}")]
    Parse(String),

    /// Context compression failed
    #[error("Context compression failed: {0}")]
    Compression(String),

    /// Answer generation failed
    #[error("Answer generation failed: {0}")]
    Generation(String),

    /// An external call exceeded its time budget
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// Request failed validation at the HTTP boundary
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Parsed document produced no text
    #[error("No text content could be extracted from '{0}'")]
    EmptyDocument(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// URL could not be fetched
    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },

    /// Vector store error
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable identifier for an error, as reported to clients and in degradations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    ModelMismatch,
    EmbeddingProviderError,
    EmptyIndex,
    RerankProviderError,
    ParseError,
    CompressionError,
    GenerationError,
    Timeout,
    InvalidRequest,
    EmptyDocument,
    FileParseError,
    FetchError,
    VectorStoreError,
    ConfigError,
    IoError,
    JsonError,
    HttpError,
    InternalError,
}

impl ErrorKind {
    /// Snake-case name used in JSON bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::ModelMismatch => "model_mismatch",
            Self::EmbeddingProviderError => "embedding_provider_error",
            Self::EmptyIndex => "empty_index",
            Self::RerankProviderError => "rerank_provider_error",
            Self::ParseError => "parse_error",
            Self::CompressionError => "compression_error",
            Self::GenerationError => "generation_error",
            Self::Timeout => "timeout",
            Self::InvalidRequest => "invalid_request",
            Self::EmptyDocument => "empty_document",
            Self::FileParseError => "file_parse_error",
            Self::FetchError => "fetch_error",
            Self::VectorStoreError => "vector_store_error",
            Self::ConfigError => "config_error",
            Self::IoError => "io_error",
            Self::JsonError => "json_error",
            Self::HttpError => "http_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create an embedding provider error
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a rerank provider error
    pub fn rerank(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RerankProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create a vector store error
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::ModelMismatch(_) => ErrorKind::ModelMismatch,
            Self::EmbeddingProvider { .. } => ErrorKind::EmbeddingProviderError,
            Self::EmptyIndex(_) => ErrorKind::EmptyIndex,
            Self::RerankProvider { .. } => ErrorKind::RerankProviderError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Compression(_) => ErrorKind::CompressionError,
            Self::Generation(_) => ErrorKind::GenerationError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::EmptyDocument(_) => ErrorKind::EmptyDocument,
            Self::FileParse { .. } => ErrorKind::FileParseError,
            Self::Fetch { .. } => ErrorKind::FetchError,
            Self::VectorStore(_) => ErrorKind::VectorStoreError,
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Io(_) => ErrorKind::IoError,
            Self::Json(_) => ErrorKind::JsonError,
            Self::Http(_) => ErrorKind::HttpError,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::UnsupportedFormat
            | ErrorKind::InvalidRequest
            | ErrorKind::EmptyDocument
            | ErrorKind::FileParseError
            | ErrorKind::JsonError => StatusCode::BAD_REQUEST,
            ErrorKind::ModelMismatch => StatusCode::CONFLICT,
            ErrorKind::EmptyIndex => StatusCode::NOT_FOUND,
            ErrorKind::EmbeddingProviderError
            | ErrorKind::RerankProviderError
            | ErrorKind::GenerationError
            | ErrorKind::FetchError
            | ErrorKind::HttpError => StatusCode::BAD_GATEWAY,
            ErrorKind::ParseError | ErrorKind::CompressionError => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::VectorStoreError
            | ErrorKind::ConfigError
            | ErrorKind::IoError
            | ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "type": self.kind().as_str(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Run `fut` under a deadline, mapping expiry to [`Error::Timeout`]
pub async fn with_timeout<T, F>(operation: &str, after: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, secs = after.as_secs(), "external call timed out");
            Err(Error::timeout(operation, after))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(Error::Parse("x".into()).kind().as_str(), "parse_error");
        assert_eq!(
            Error::timeout("embedding", Duration::from_secs(3)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            Error::timeout("embedding", Duration::from_secs(3)).to_string(),
            "embedding timed out after 3s"
        );
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }
}
