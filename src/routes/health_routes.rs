//! Health check endpoints.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Simple liveness check.
///
/// Readiness is implied by the process serving at all: startup refuses to
/// bind the listener until the first upstream login has succeeded.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
