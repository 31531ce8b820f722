use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pdfpost_core::{LedgerEntry, LedgerFilter};

use crate::state::AppState;

/// Maximum allowed limit for ledger queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ledger queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for the ledger endpoint
#[derive(Debug, Deserialize)]
pub struct LedgerQueryParams {
    /// Filter by file id
    pub file_id: Option<String>,
    /// Filter by action, e.g. `PROCESSED - LOGO`
    pub action: Option<String>,
    /// Filter by the worker that wrote the entry
    pub holder_id: Option<String>,
    /// Maximum number of entries to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LedgerQueryResponse {
    pub entries: Vec<LedgerEntry>,
    /// Total number of matching entries
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct LedgerErrorResponse {
    pub error: String,
}

type ErrorReply = (StatusCode, Json<LedgerErrorResponse>);

fn internal_error(context: &str, e: impl std::fmt::Display) -> ErrorReply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(LedgerErrorResponse {
            error: format!("{}: {}", context, e),
        }),
    )
}

/// Query ledger entries, newest first
pub async fn query_ledger(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LedgerQueryParams>,
) -> Result<Json<LedgerQueryResponse>, ErrorReply> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = LedgerFilter::new().with_limit(limit).with_offset(offset);
    if let Some(file_id) = params.file_id {
        filter = filter.with_file_id(file_id);
    }
    if let Some(action) = params.action {
        filter = filter.with_action(action);
    }
    if let Some(holder_id) = params.holder_id {
        filter = filter.with_holder_id(holder_id);
    }

    let entries = state
        .ledger()
        .query(&filter)
        .await
        .map_err(|e| internal_error("Failed to query ledger", e))?;

    // count ignores limit and offset
    let total = state
        .ledger()
        .count(&filter)
        .await
        .map_err(|e| internal_error("Failed to count ledger entries", e))?;

    Ok(Json(LedgerQueryResponse {
        entries,
        total,
        limit,
        offset,
    }))
}
