//! Database management endpoints

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{ClearResponse, StatusResponse};

/// DELETE /api/database - Remove every document and chunk
pub async fn clear_database(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    Ok(Json(state.service().clear().await?))
}

/// GET /api/database/status - Counts per embedding model
pub async fn database_status(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    Ok(Json(state.service().status().await?))
}
