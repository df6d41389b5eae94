//! API routes

pub mod database;
pub mod query;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};

use crate::server::state::AppState;
use crate::types::{ChatModel, EmbeddingModel, RerankMethod, SUPPORTED_EXTENSIONS};

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload::upload_files).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/upload-url", post(upload::upload_url))
        .route("/query", post(query::query))
        .route("/database", delete(database::clear_database))
        .route("/database/status", get(database::database_status))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    let embedding_models: Vec<_> = EmbeddingModel::ALL
        .iter()
        .map(|m| serde_json::json!({ "name": m.as_str(), "dimensions": m.dimensions() }))
        .collect();

    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document chat with cited answers",
        "endpoints": {
            "POST /api/upload": "Upload files (multipart: files, embedding_model)",
            "POST /api/upload-url": "Fetch and index a web page",
            "POST /api/query": "Ask a question about indexed documents",
            "DELETE /api/database": "Remove all documents and chunks",
            "GET /api/database/status": "Document and chunk counts per embedding model"
        },
        "supported_formats": SUPPORTED_EXTENSIONS,
        "embedding_models": embedding_models,
        "chat_models": ChatModel::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
        "rerank_methods": RerankMethod::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
    }))
}
