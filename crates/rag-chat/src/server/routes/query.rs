//! Query endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Answer, QueryRequest};

/// POST /api/query - Answer a question from indexed documents
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Answer>> {
    let Json(request) = payload.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    let answer = state.service().query(&request).await?;
    Ok(Json(answer))
}
