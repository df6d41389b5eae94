//! Configuration for the document chat service
//!
//! Values come from compiled defaults, then an optional TOML file, then
//! environment variables. Every section can be omitted from the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{ChatModel, EmbeddingModel};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// OpenAI API access (embeddings and chat)
    pub openai: OpenAiConfig,
    /// Cohere API access (embeddings and rerank)
    pub cohere: CohereConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Answer generation configuration
    pub llm: LlmConfig,
    /// Re-ranking configuration
    pub rerank: RerankConfig,
    /// Context compression configuration
    pub compression: CompressionConfig,
    /// Vector store configuration
    pub vector_db: VectorDbConfig,
    /// Ingestion processing configuration
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(key) = get("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            self.openai.base_url = url;
        }
        if let Some(key) = get("COHERE_API_KEY").filter(|v| !v.is_empty()) {
            self.cohere.api_key = Some(key);
        }
        if let Some(host) = get("RAG_HOST").filter(|v| !v.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = get("RAG_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = get("RAG_STORAGE_PATH").filter(|v| !v.is_empty()) {
            self.vector_db.storage_path = PathBuf::from(path);
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.rerank.candidate_multiplier == 0 {
            return Err(Error::Config("rerank.candidate_multiplier must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Models applied to requests that do not name one
    pub fn model_defaults(&self) -> ModelDefaults {
        ModelDefaults {
            embedding: self.embeddings.default_model,
            chat: self.llm.default_model,
        }
    }
}

/// Configured fallback models for uploads and queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDefaults {
    pub embedding: EmbeddingModel,
    pub chat: ChatModel,
}

impl ModelDefaults {
    pub fn embedding(&self, requested: Option<EmbeddingModel>) -> EmbeddingModel {
        requested.unwrap_or(self.embedding)
    }

    pub fn chat(&self, requested: Option<ChatModel>) -> ChatModel {
        requested.unwrap_or(self.chat)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// OpenAI API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key (usually from OPENAI_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            max_retries: 2,
        }
    }
}

/// Cohere API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CohereConfig {
    /// API key (usually from COHERE_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Rerank model name
    pub rerank_model: String,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for CohereConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.cohere.com/v1".to_string(),
            rerank_model: "rerank-english-v3.0".to_string(),
            max_retries: 2,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model used when a request names none
    pub default_model: EmbeddingModel,
    /// Texts per embedding API call
    pub batch_size: usize,
    /// Timeout for one embedding call in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            default_model: EmbeddingModel::default(),
            batch_size: 96,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
    /// Minimum chunk size (skip smaller chunks)
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_chunk_size: 20,
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model used when a request names none
    pub default_model: ChatModel,
    /// Sampling temperature
    pub temperature: f32,
    /// Timeout for one completion in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: ChatModel::default(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Re-ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Retrieve `K * candidate_multiplier` chunks when a re-ranker runs
    pub candidate_multiplier: usize,
    /// Timeout for one re-rank call in seconds
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: 2,
            timeout_secs: 30,
        }
    }
}

impl RerankConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Context compression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Model used for extraction
    pub model: ChatModel,
    /// Chunks shorter than this are passed through untouched
    pub min_chunk_chars: usize,
    /// Context budget when falling back to truncation (~3000 tokens at 4 chars/token)
    pub max_context_chars: usize,
    /// Timeout for one extraction call in seconds
    pub timeout_secs: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            model: ChatModel::Gpt35Turbo,
            min_chunk_chars: 200,
            max_context_chars: 12_000,
            timeout_secs: 30,
        }
    }
}

impl CompressionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Snapshot file for stored chunks
    pub storage_path: PathBuf,
    /// Write a snapshot after every change
    pub persist: bool,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rag-chat")
            .join("vectors.json");

        Self {
            storage_path,
            persist: true,
        }
    }
}

impl VectorDbConfig {
    /// Directory holding the snapshot and the document registry
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Timeout for ingesting a single item in seconds
    pub file_timeout_secs: u64,
    /// Timeout for fetching a URL in seconds
    pub url_timeout_secs: u64,
    /// Longest web page text kept, in characters
    pub max_url_chars: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            file_timeout_secs: 120,
            url_timeout_secs: 30,
            max_url_chars: 50_000,
        }
    }
}

impl ProcessingConfig {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    pub fn url_timeout(&self) -> Duration {
        Duration::from_secs(self.url_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.rerank.candidate_multiplier, 2);
        assert_eq!(config.compression.max_context_chars, 12_000);
        assert_eq!(config.processing.file_timeout_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = RagConfig::from_toml(
            r#"
            [server]
            port = 9100

            [chunking]
            chunk_size = 800

            [embeddings]
            default_model = "cohere-v3"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.embeddings.default_model, EmbeddingModel::CohereV3);
    }

    #[test]
    fn test_model_defaults_fill_only_missing_models() {
        let config = RagConfig::from_toml(
            "[embeddings]\ndefault_model = \"cohere-v3\"\n[llm]\ndefault_model = \"gpt-4\"\n",
        )
        .unwrap();
        let defaults = config.model_defaults();
        assert_eq!(defaults.embedding(None), EmbeddingModel::CohereV3);
        assert_eq!(
            defaults.embedding(Some(EmbeddingModel::TextEmbedding3Large)),
            EmbeddingModel::TextEmbedding3Large
        );
        assert_eq!(defaults.chat(None), ChatModel::Gpt4);
    }

    #[test]
    fn test_unknown_model_in_toml_rejected() {
        let err = RagConfig::from_toml("[llm]\ndefault_model = \"llama\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("COHERE_API_KEY", ""),
            ("RAG_PORT", "9001"),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert!(config.cohere.api_key.is_none());
        assert_eq!(config.server.port, 9001);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = 500;
        assert!(config.validate().is_err());
    }
}
