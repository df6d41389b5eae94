//! Upload endpoints

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{EmbeddingModel, UploadItemResult, UploadResponse, UploadUrlRequest};

/// POST /api/upload - Upload and index files
///
/// Multipart fields: `files` (repeated) and an optional `embedding_model`.
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut files = Vec::new();
    let mut model = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "embedding_model" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::InvalidRequest(format!("Failed to read embedding_model: {}", e)))?;
                if !value.trim().is_empty() {
                    model = Some(value.parse::<EmbeddingModel>()?);
                }
            }
            "files" | "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| Error::InvalidRequest("file part has no filename".to_string()))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidRequest(format!("Failed to read '{}': {}", filename, e)))?;

                tracing::info!("Received file: {} ({} bytes)", filename, data.len());
                files.push((filename, data.to_vec()));
            }
            other => {
                tracing::debug!("Ignoring multipart field '{}'", other);
            }
        }
    }

    if files.is_empty() {
        return Err(Error::InvalidRequest("no files in upload".to_string()));
    }

    Ok(Json(state.service().upload(files, model).await))
}

/// POST /api/upload-url - Fetch and index a web page
pub async fn upload_url(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UploadUrlRequest>, JsonRejection>,
) -> Result<Json<UploadItemResult>> {
    let Json(request) = payload.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    if request.url.trim().is_empty() {
        return Err(Error::InvalidRequest("url must not be empty".to_string()));
    }

    tracing::info!("Fetching URL: {}", request.url);
    Ok(Json(
        state
            .service()
            .upload_url(request.url.trim(), request.embedding_model)
            .await,
    ))
}
