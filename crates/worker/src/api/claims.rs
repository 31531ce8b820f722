use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use pdfpost_core::Claim;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClaimListResponse {
    pub claims: Vec<Claim>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ClaimErrorResponse {
    pub error: String,
}

/// List live claims, oldest first.
pub async fn list_claims(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClaimListResponse>, (StatusCode, Json<ClaimErrorResponse>)> {
    let claims = state.claims().list().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ClaimErrorResponse {
                error: format!("Failed to list claims: {}", e),
            }),
        )
    })?;

    Ok(Json(ClaimListResponse {
        count: claims.len(),
        claims,
    }))
}
