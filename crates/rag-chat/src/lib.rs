//! rag-chat: document chat with cited answers
//!
//! Files and web pages are parsed, chunked and embedded into one vector
//! collection per embedding model. Queries run a retrieve, re-rank, compress
//! and generate pipeline in which the middle two stages are optional and only
//! degrade the answer when they fail.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{Pipeline, PipelineState};
pub use service::RagService;
pub use types::{
    Answer, ChatModel, Chunk, ChunkSource, Citation, Document, EmbeddingModel, FileType,
    QueryRequest, RerankMethod,
};
