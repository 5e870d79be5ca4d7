//! Relay audit endpoints.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::models::RelayAudit;
use crate::state::AppState;
use crate::utils::{map_store_error, HTTPError};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 200;

/// Registers relay audit routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/audit", get(recent_relays))
}

#[derive(Deserialize)]
struct AuditQuery {
    limit: Option<i64>,
}

/// Lists the most recently relayed status changes, newest first.
async fn recent_relays(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<RelayAudit>>, HTTPError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let relays = state
        .store
        .recent_relays(limit)
        .await
        .map_err(map_store_error)?;
    Ok(Json(relays))
}
