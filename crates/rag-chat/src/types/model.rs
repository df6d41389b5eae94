//! Closed sets of model and method names accepted at the API boundary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Embedding models a collection can be built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EmbeddingModel {
    /// OpenAI text-embedding-3-small (1536 dims)
    #[default]
    #[serde(rename = "text-embedding-3-small")]
    TextEmbedding3Small,
    /// OpenAI text-embedding-3-large (3072 dims)
    #[serde(rename = "text-embedding-3-large")]
    TextEmbedding3Large,
    /// OpenAI text-embedding-ada-002 (1536 dims)
    #[serde(rename = "text-embedding-ada-002")]
    TextEmbeddingAda002,
    /// Cohere embed-english-v3.0 (1024 dims)
    #[serde(rename = "cohere-v3")]
    CohereV3,
}

impl EmbeddingModel {
    /// Every accepted model, in display order
    pub const ALL: [EmbeddingModel; 4] = [
        Self::TextEmbedding3Small,
        Self::TextEmbedding3Large,
        Self::TextEmbeddingAda002,
        Self::CohereV3,
    ];

    /// Name used in requests and as the collection name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextEmbedding3Small => "text-embedding-3-small",
            Self::TextEmbedding3Large => "text-embedding-3-large",
            Self::TextEmbeddingAda002 => "text-embedding-ada-002",
            Self::CohereV3 => "cohere-v3",
        }
    }

    /// Model identifier sent to the provider API
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::CohereV3 => "embed-english-v3.0",
            other => other.as_str(),
        }
    }

    /// Vector length produced by the model
    pub fn dimensions(&self) -> usize {
        match self {
            Self::TextEmbedding3Small | Self::TextEmbeddingAda002 => 1536,
            Self::TextEmbedding3Large => 3072,
            Self::CohereV3 => 1024,
        }
    }

    /// Provider family that serves this model
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::CohereV3 => ProviderKind::Cohere,
            _ => ProviderKind::OpenAi,
        }
    }
}

/// Hosted API family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Cohere,
}

/// Chat models available for answer generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChatModel {
    #[default]
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
}

impl ChatModel {
    /// Every accepted model, in display order
    pub const ALL: [ChatModel; 5] = [
        Self::Gpt35Turbo,
        Self::Gpt4,
        Self::Gpt4Turbo,
        Self::Gpt4o,
        Self::Gpt4oMini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Gpt4 => "gpt-4",
            Self::Gpt4Turbo => "gpt-4-turbo",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
        }
    }
}

/// Re-ranking strategy applied after retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RerankMethod {
    /// Keep retrieval order
    #[default]
    #[serde(rename = "none")]
    None,
    /// Score with a dedicated cross-encoder service
    #[serde(rename = "external-rerank-model", alias = "cohere")]
    External,
    /// Ask the chat model for relevance scores
    #[serde(rename = "llm-based", alias = "llm")]
    LlmBased,
}

impl RerankMethod {
    pub const ALL: [RerankMethod; 3] = [Self::None, Self::External, Self::LlmBased];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::External => "external-rerank-model",
            Self::LlmBased => "llm-based",
        }
    }

    /// Whether the re-rank stage runs at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

fn unknown(what: &str, value: &str, accepted: &[&str]) -> Error {
    Error::InvalidRequest(format!(
        "unknown {} '{}'; expected one of: {}",
        what,
        value,
        accepted.join(", ")
    ))
}

impl FromStr for EmbeddingModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                unknown("embedding model", s, &names)
            })
    }
}

impl FromStr for ChatModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                unknown("chat model", s, &names)
            })
    }
}

impl FromStr for RerankMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "external-rerank-model" | "cohere" => Ok(Self::External),
            "llm-based" | "llm" => Ok(Self::LlmBased),
            other => {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                Err(unknown("rerank method", other, &names))
            }
        }
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RerankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_model_round_trips_through_names() {
        for model in EmbeddingModel::ALL {
            assert_eq!(model.as_str().parse::<EmbeddingModel>().unwrap(), model);
        }
        assert_eq!(EmbeddingModel::CohereV3.api_name(), "embed-english-v3.0");
        assert_eq!(EmbeddingModel::TextEmbedding3Large.dimensions(), 3072);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let err = "bert-base".parse::<EmbeddingModel>().unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!("gpt-5".parse::<ChatModel>().is_err());
        assert!("random".parse::<RerankMethod>().is_err());
    }

    #[test]
    fn test_rerank_aliases() {
        assert_eq!("cohere".parse::<RerankMethod>().unwrap(), RerankMethod::External);
        assert_eq!("llm".parse::<RerankMethod>().unwrap(), RerankMethod::LlmBased);
        let parsed: RerankMethod = serde_json::from_str("\"llm\"").unwrap();
        assert_eq!(parsed, RerankMethod::LlmBased);
        assert_eq!(
            serde_json::to_string(&RerankMethod::External).unwrap(),
            "\"external-rerank-model\""
        );
    }
}
