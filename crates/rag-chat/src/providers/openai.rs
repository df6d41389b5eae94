//! OpenAI providers for embeddings and chat completions
//!
//! One `OpenAiClient` holds the HTTP connection pool and credentials; the
//! embedder and chat providers wrap it to implement the provider traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::error::{Error, Result};
use crate::types::{ChatModel, EmbeddingModel};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;
use super::retry::JsonClient;

const PROVIDER: &str = "openai";

/// OpenAI API client with automatic retry
pub struct OpenAiClient {
    api: JsonClient,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body).ok().map(|e| e.error.message)
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        if config.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; OpenAI calls will fail");
        }

        Ok(Self {
            api: JsonClient::new(
                PROVIDER,
                "OPENAI_API_KEY",
                config.api_key.clone(),
                &config.base_url,
                config.max_retries,
                error_detail,
            )?,
        })
    }

    /// Embed texts with one model, preserving input order
    pub async fn embed_texts(
        &self,
        model: EmbeddingModel,
        texts: &[String],
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, model = %model, batch_size = texts.len(), "embedding batch");

        let request = EmbeddingRequest {
            model: model.api_name(),
            input: texts,
        };
        let response: EmbeddingResponse = self
            .api
            .post_json("/embeddings", &request, timeout)
            .await
            .map_err(|e| Error::embedding(PROVIDER, e.message))?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(Error::embedding(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), data.len()),
            ));
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Single-turn chat completion
    pub async fn chat(
        &self,
        model: ChatModel,
        prompt: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String> {
        debug!(provider = PROVIDER, model = %model, prompt_len = prompt.len(), "chat completion");

        let request = ChatRequest {
            model: model.as_str(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };
        let response: ChatResponse = self
            .api
            .post_json("/chat/completions", &request, timeout)
            .await
            .map_err(|e| Error::Generation(format!("{}: {}", PROVIDER, e.message)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Generation(format!("{}: response contained no message", PROVIDER)))
    }
}

/// OpenAI embedding provider for one model
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: EmbeddingModel,
    batch_size: usize,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(
        client: Arc<OpenAiClient>,
        model: EmbeddingModel,
        batch_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            model,
            batch_size: batch_size.max(1),
            timeout,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        self.client
            .embed_texts(self.model, &texts, self.timeout)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.client.embed_texts(self.model, batch, self.timeout).await?);
        }
        Ok(embeddings)
    }

    fn model(&self) -> EmbeddingModel {
        self.model
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// OpenAI chat completion provider
pub struct OpenAiChat {
    client: Arc<OpenAiClient>,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(client: Arc<OpenAiClient>, temperature: f32) -> Self {
        Self { client, temperature }
    }
}

#[async_trait]
impl LlmProvider for OpenAiChat {
    async fn complete(&self, prompt: &str, model: ChatModel, timeout: Duration) -> Result<String> {
        self.client.chat(model, prompt, self.temperature, timeout).await
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
