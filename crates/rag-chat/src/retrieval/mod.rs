//! Query-time stages: retrieval, re-ranking and context compression

pub mod compress;
pub mod rerank;
pub mod retriever;

pub use compress::{fit_to_budget, Compressed, ContextCompressor, TRUNCATION_MARKER};
pub use rerank::{parse_scores, Reranker};
pub use retriever::Retriever;
