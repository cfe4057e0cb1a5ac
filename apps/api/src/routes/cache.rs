use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
}

/// GET /cache
/// Number of cached artifacts per pipeline step.
pub async fn handle_cache_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    Ok(Json(state.cache.stats().await?))
}

/// DELETE /cache
/// Drops every cached artifact so the next generation recomputes all steps.
pub async fn handle_clear_cache(
    State(state): State<AppState>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    let removed = state.cache.clear().await?;
    Ok(Json(ClearCacheResponse { removed }))
}
