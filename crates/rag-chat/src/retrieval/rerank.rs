//! Re-ranking of retrieved candidates
//!
//! Scores come from an external cross-encoder or from a single LLM prompt. On
//! success the candidates are sorted by score (ties keep retrieval order) and
//! cut to K. Callers fall back to [`Reranker::fallback`] on any error.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::error::{with_timeout, Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::Providers;
use crate::types::{ChatModel, RerankMethod, RetrievedContext};

/// Highest score the LLM prompt asks for
const MAX_LLM_SCORE: f32 = 10.0;

/// Re-ranking stage
pub struct Reranker {
    providers: Arc<Providers>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(providers: Arc<Providers>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Reorder `context` by relevance to `query` and keep the best `k`.
    ///
    /// `chat_model` is used by the LLM-based method.
    pub async fn rerank(
        &self,
        query: &str,
        context: RetrievedContext,
        method: RerankMethod,
        chat_model: ChatModel,
        k: usize,
    ) -> Result<RetrievedContext> {
        if context.is_empty() {
            return Ok(context);
        }

        let texts: Vec<String> = context.iter().map(|c| c.chunk.content.clone()).collect();
        let scores = match method {
            RerankMethod::None => return Ok(Self::fallback(context, k)),
            RerankMethod::External => self.external_scores(query, &texts).await?,
            RerankMethod::LlmBased => self.llm_scores(query, &texts, chat_model).await?,
        };

        Ok(apply_scores(context, scores, k))
    }

    /// First `k` chunks in retrieval order
    pub fn fallback(mut context: RetrievedContext, k: usize) -> RetrievedContext {
        context.truncate(k);
        context
    }

    async fn external_scores(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let reranker = self
            .providers
            .reranker()
            .ok_or_else(|| Error::rerank("cohere", "no external rerank model configured (COHERE_API_KEY unset)"))?;

        let scores = with_timeout("rerank", self.timeout, reranker.score(query, texts)).await?;
        if scores.len() != texts.len() {
            return Err(Error::rerank(
                reranker.name(),
                format!("expected {} scores, got {}", texts.len(), scores.len()),
            ));
        }
        Ok(scores)
    }

    async fn llm_scores(&self, query: &str, texts: &[String], model: ChatModel) -> Result<Vec<f32>> {
        let llm = self.providers.llm();
        let passages: Vec<&str> = texts.iter().map(String::as_str).collect();
        let prompt = PromptBuilder::build_rerank_prompt(query, &passages);

        let reply = with_timeout("llm rerank", self.timeout, llm.complete(&prompt, model, self.timeout))
            .await
            .map_err(|e| match e {
                Error::Timeout { .. } => e,
                other => Error::rerank(llm.name(), other.to_string()),
            })?;

        parse_scores(&reply, texts.len())
    }
}

/// Attach scores, stable-sort descending and keep the best `k`
fn apply_scores(mut context: RetrievedContext, scores: Vec<f32>, k: usize) -> RetrievedContext {
    for (chunk, score) in context.chunks.iter_mut().zip(scores) {
        chunk.rerank_score = Some(score);
    }

    let key = |s: Option<f32>| s.filter(|v| !v.is_nan()).unwrap_or(f32::NEG_INFINITY);
    context
        .chunks
        .sort_by(|a, b| key(b.rerank_score).partial_cmp(&key(a.rerank_score)).unwrap_or(Ordering::Equal));
    context.truncate(k);
    context
}

fn numbered_line_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?im)^\s*(?:passage\s*)?\[?(\d+)\]?\s*[:.)=-]\s*(-?\d+(?:\.\d+)?)").ok()
        })
        .as_ref()
}

/// Read one score per passage from an LLM reply.
///
/// Accepts a JSON array with one entry per passage, or lines like `2: 7.5`
/// and `[2]: 7.5`.
pub fn parse_scores(reply: &str, expected: usize) -> Result<Vec<f32>> {
    let array = parse_json_array(reply);
    if let Some(scores) = array.as_ref().filter(|s| s.len() == expected) {
        return Ok(clamp_scores(scores.clone()));
    }

    if let Some(scores) = parse_numbered_lines(reply, expected) {
        return Ok(clamp_scores(scores));
    }

    if let Some(scores) = array {
        return Err(Error::Parse(format!(
            "expected {} scores, reply had {}",
            expected,
            scores.len()
        )));
    }

    let preview: String = reply.chars().take(120).collect();
    Err(Error::Parse(format!(
        "no {} relevance scores found in reply: {:?}",
        expected, preview
    )))
}

/// First `[...]` holding numbers, unless it is a passage label like `[1]:`
fn parse_json_array(reply: &str) -> Option<Vec<f32>> {
    let start = reply.find('[')?;
    let end = start + reply[start..].find(']')?;
    let after = reply[end + 1..].trim_start();
    if after.starts_with(':') || after.starts_with('=') {
        return None;
    }
    serde_json::from_str::<Vec<f32>>(&reply[start..=end]).ok()
}

fn parse_numbered_lines(reply: &str, expected: usize) -> Option<Vec<f32>> {
    let pattern = numbered_line_pattern()?;
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for caps in pattern.captures_iter(reply) {
        let index: usize = caps[1].parse().unwrap_or(0);
        let score: Option<f32> = caps[2].parse().ok();
        if let (Some(slot), Some(score)) = (index.checked_sub(1).and_then(|i| scores.get_mut(i)), score) {
            *slot = Some(score);
        }
    }
    if expected > 0 && scores.iter().all(Option::is_some) {
        Some(scores.into_iter().flatten().collect())
    } else {
        None
    }
}

fn clamp_scores(scores: Vec<f32>) -> Vec<f32> {
    scores.into_iter().map(|s| s.clamp(0.0, MAX_LLM_SCORE)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkSource, EmbeddingModel, FileType, ScoredChunk};
    use uuid::Uuid;

    fn context(n: usize) -> RetrievedContext {
        let doc = Uuid::new_v4();
        RetrievedContext::new(
            (0..n)
                .map(|i| {
                    let source = ChunkSource {
                        title: "a.txt".into(),
                        path: "a.txt".into(),
                        file_type: FileType::Txt,
                        page_number: Some(1),
                        page_estimated: false,
                        paragraph_number: None,
                        url: None,
                        embedding_model: EmbeddingModel::default(),
                    };
                    let chunk = Chunk::new(doc, format!("chunk {}", i), source, 0, 7, i as u32);
                    ScoredChunk::new(chunk, 1.0 - i as f32 * 0.1)
                })
                .collect(),
        )
    }

    #[test]
    fn test_parse_json_array() {
        assert_eq!(parse_scores("Scores: [3, 9.5, 0]", 3).unwrap(), vec![3.0, 9.5, 0.0]);
    }

    #[test]
    fn test_parse_numbered_lines() {
        let reply = "1: 4\nPassage 2: 8.5\n3) 11";
        assert_eq!(parse_scores(reply, 3).unwrap(), vec![4.0, 8.5, 10.0]);
    }

    #[test]
    fn test_parse_bracketed_labels() {
        assert_eq!(parse_scores("[1]: 8\n[2]: 3", 2).unwrap(), vec![8.0, 3.0]);
        assert_eq!(parse_scores("[1]: 8", 1).unwrap(), vec![8.0]);
    }

    #[test]
    fn test_short_array_falls_through_to_lines() {
        let reply = "Scores [see below]\n1: 6\n2: 2";
        assert_eq!(parse_scores(reply, 2).unwrap(), vec![6.0, 2.0]);
        assert_eq!(parse_scores("[7]\n1: 6\n2: 2", 2).unwrap(), vec![6.0, 2.0]);
    }

    #[test]
    fn test_parse_count_mismatch() {
        let err = parse_scores("[1, 2]", 3).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_scores("The passages are all relevant.", 2).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }

    #[test]
    fn test_apply_scores_stable_and_truncated() {
        let ctx = context(4);
        let ids: Vec<Uuid> = ctx.iter().map(|c| c.chunk.id).collect();

        let ranked = apply_scores(ctx, vec![5.0, 9.0, 5.0, 1.0], 3);
        let got: Vec<Uuid> = ranked.iter().map(|c| c.chunk.id).collect();
        assert_eq!(got, vec![ids[1], ids[0], ids[2]]);
        assert_eq!(ranked.chunks[0].rerank_score, Some(9.0));
    }

    #[test]
    fn test_fallback_keeps_retrieval_order() {
        let ctx = context(6);
        let ids: Vec<Uuid> = ctx.iter().map(|c| c.chunk.id).collect();
        let kept = Reranker::fallback(ctx, 3);
        let got: Vec<Uuid> = kept.iter().map(|c| c.chunk.id).collect();
        assert_eq!(got, ids[..3].to_vec());
    }
}
