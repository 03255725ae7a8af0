//! Health and sync status endpoints

use crate::{api::canvas::AppState, api::error::ApiError, sync::HealthSyncStatus};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SyncStatusQuery {
    pub process_id: String,
}

pub fn create_health_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/health/get_sync_status", get(get_sync_status))
}

/// Liveness check
async fn health_check() -> &'static str {
    "ok"
}

/// GET /health/get_sync_status?process_id=
async fn get_sync_status(
    State(state): State<AppState>,
    Query(query): Query<SyncStatusQuery>,
) -> Result<Json<HealthSyncStatus>, ApiError> {
    let status = state.storage.get_sync_status(&query.process_id).await?;
    tracing::debug!(
        "🩺 Sync status for '{}': {}",
        query.process_id,
        status.neo4j_status.as_str()
    );
    Ok(Json(status))
}
