//! Click ingestion endpoint

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};

use super::parse_banner_id;
use crate::error::Result;
use crate::state::AppState;

/// GET /counter/:banner_id
///
/// Counts one click at the current time. Never waits on storage.
///
/// Returns 204 No Content.
pub async fn count_click(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse> {
    let banner_id = parse_banner_id(&raw_id)?;

    state.service.inc_click(banner_id);
    state.metrics.inc_clicks();

    Ok((StatusCode::NO_CONTENT, [(header::CACHE_CONTROL, "no-store")]))
}
