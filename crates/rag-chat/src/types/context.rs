//! Ranked context handed from stage to stage during a query

use serde::Serialize;

use super::document::Chunk;

/// A retrieved chunk with its scores
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more similar)
    pub similarity: f32,
    /// Score assigned by the re-rank stage, if it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, similarity: f32) -> Self {
        Self {
            chunk,
            similarity,
            rerank_score: None,
        }
    }
}

/// Ordered chunks for one query; index 0 is the most relevant
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievedContext {
    pub fn new(chunks: Vec<ScoredChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Keep only the first `k` chunks
    pub fn truncate(&mut self, k: usize) {
        self.chunks.truncate(k);
    }

    /// Total characters of chunk text
    pub fn total_chars(&self) -> usize {
        self.chunks.iter().map(|c| c.chunk.content.chars().count()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.chunks.iter()
    }
}
