//! Extractive context compression
//!
//! Each chunk is reduced to the sentences the LLM copies out as relevant. A
//! chunk's metadata never changes and its text never grows.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CompressionConfig;
use crate::error::{with_timeout, Error, Result};
use crate::generation::{PromptBuilder, NO_OUTPUT};
use crate::providers::LlmProvider;
use crate::types::{ChatModel, RetrievedContext};

/// Appended where fallback truncation cut a chunk
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Outcome of the compression stage
#[derive(Debug, Clone)]
pub struct Compressed {
    pub context: RetrievedContext,
    /// At least one chunk got shorter
    pub shortened: bool,
}

/// LLM-based chunk extractor
pub struct ContextCompressor {
    llm: Arc<dyn LlmProvider>,
    min_chunk_chars: usize,
    max_context_chars: usize,
    timeout: Duration,
}

impl ContextCompressor {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &CompressionConfig) -> Self {
        Self {
            llm,
            min_chunk_chars: config.min_chunk_chars,
            max_context_chars: config.max_context_chars,
            timeout: config.timeout(),
        }
    }

    /// Context budget used by [`fit_to_budget`] on fallback
    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Replace each chunk's text with its query-relevant extract.
    ///
    /// Any failed extraction fails the whole stage.
    pub async fn compress(
        &self,
        query: &str,
        context: &RetrievedContext,
        model: ChatModel,
    ) -> Result<Compressed> {
        let extractions = join_all(context.iter().map(|scored| {
            let text = scored.chunk.content.as_str();
            async move {
                if text.chars().count() < self.min_chunk_chars {
                    return Ok(None);
                }
                let prompt = PromptBuilder::build_compression_prompt(query, text);
                with_timeout("compression", self.timeout, self.llm.complete(&prompt, model, self.timeout))
                    .await
                    .map(Some)
            }
        }))
        .await;

        let mut compressed = context.clone();
        let mut shortened = false;
        for (scored, extraction) in compressed.chunks.iter_mut().zip(extractions) {
            let reply = match extraction {
                Ok(Some(reply)) => reply,
                Ok(None) => continue,
                Err(e @ Error::Timeout { .. }) => return Err(e),
                Err(e) => return Err(Error::Compression(e.to_string())),
            };

            if let Some(extract) = accept_extract(&scored.chunk.content, &reply) {
                scored.chunk.content = extract;
                shortened = true;
            }
        }

        tracing::debug!(
            before = context.total_chars(),
            after = compressed.total_chars(),
            "Compressed context"
        );

        Ok(Compressed {
            context: compressed,
            shortened,
        })
    }
}

/// The extract to use in place of `original`, if it is usable and strictly shorter
fn accept_extract(original: &str, reply: &str) -> Option<String> {
    let extract = reply.trim();
    if extract.is_empty() || extract.starts_with(NO_OUTPUT) {
        return None;
    }
    (extract.chars().count() < original.chars().count()).then(|| extract.to_string())
}

/// Cap total chunk text at `max_chars`, cutting trailing chunks.
///
/// Every chunk and its metadata stay in place; only text is cut. Returns
/// whether anything was cut.
pub fn fit_to_budget(context: &mut RetrievedContext, max_chars: usize) -> bool {
    let marker_len = TRUNCATION_MARKER.chars().count();
    let mut remaining = max_chars;
    let mut cut = false;

    for scored in context.chunks.iter_mut() {
        let len = scored.chunk.content.chars().count();
        if len <= remaining {
            remaining -= len;
            continue;
        }

        // Only cut when the marked text is actually shorter
        if remaining + marker_len < len {
            let keep: String = scored.chunk.content.chars().take(remaining).collect();
            scored.chunk.content = format!("{}{}", keep, TRUNCATION_MARKER);
            cut = true;
        }
        remaining = 0;
    }

    cut
}
