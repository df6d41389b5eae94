//! LLM provider trait for prompt completion

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::ChatModel;

/// Trait for text completion
///
/// Used for answer generation, LLM-based re-ranking and context compression.
/// Errors are reported as `Error::Generation`; callers re-tag them for their stage.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a single-turn prompt with the given model
    async fn complete(&self, prompt: &str, model: ChatModel, timeout: Duration) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
