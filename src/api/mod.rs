//! HTTP API layer
//!
//! Canvas load/save, layout preview and sync status endpoints.

// GET/PUT /canvas and the shared application state
pub mod canvas;

// /healthz and /health/get_sync_status
pub mod health;

// JSON error bodies
pub mod error;

pub use canvas::{create_canvas_routes, AppState};
pub use error::{ApiError, ErrorBody};
pub use health::create_health_routes;

use axum::Router;

/// All API routes with state attached
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(create_canvas_routes())
        .merge(create_health_routes())
        .with_state(state)
}
