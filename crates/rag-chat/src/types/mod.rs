//! Core data types

pub mod context;
pub mod document;
pub mod model;
pub mod query;
pub mod response;

pub use context::{RetrievedContext, ScoredChunk};
pub use document::{Chunk, ChunkSource, Document, FileType, SUPPORTED_EXTENSIONS};
pub use model::{ChatModel, EmbeddingModel, ProviderKind, RerankMethod};
pub use query::{QueryRequest, UploadUrlRequest};
pub use response::{
    Answer, Citation, ClearResponse, CollectionStatus, Degradation, ItemStatus, StatusResponse,
    UploadItemResult, UploadResponse,
};
