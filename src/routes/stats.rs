//! Per-minute click statistics endpoint

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use tracing::error;

use super::parse_banner_id;
use crate::error::{AppError, Result};
use crate::models::{StatsRequest, StatsResponse};
use crate::state::AppState;

/// POST /stats/:banner_id
///
/// Body: `{"from": RFC3339, "to": RFC3339}`, `from` inclusive, `to` exclusive.
///
/// Returns counts per minute with persisted and not yet flushed clicks merged.
/// Minutes without clicks are omitted.
pub async fn get_stats(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Json<StatsResponse>> {
    let banner_id = parse_banner_id(&raw_id)?;
    let request: StatsRequest = serde_json::from_slice(&body)?;

    if request.to <= request.from {
        return Err(AppError::InvalidRequest("to must be after from".into()));
    }

    state.metrics.inc_stats_requests();

    let stats = state
        .service
        .get_stats(banner_id, request.from, request.to)
        .await
        .map_err(|e| {
            error!(error = %e, banner_id = banner_id, "Stats query failed");
            e
        })?;

    Ok(Json(StatsResponse { stats }))
}
