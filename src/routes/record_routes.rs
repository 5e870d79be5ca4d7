//! Record relay endpoints.

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use crate::models::RelayAudit;
use crate::state::AppState;
use crate::upstream::{RecordInfo, StatusUpdateOutcome};
use crate::utils::{HTTPError, map_client_error};

/// Registers record relay routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/records/:id", get(get_record))
        .route("/api/v1/records/:id/status", patch(update_record_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStatusRequest {
    new_status_id: String,
}

/// Fetches a record from the upstream and forwards it.
async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordInfo>, HTTPError> {
    let record = state
        .upstream
        .get_record_info(&id)
        .await
        .map_err(map_client_error)?;
    Ok(Json(record))
}

/// Relays a status change upstream, then audits it when a store is
/// configured. The audit write is best effort: a store hiccup must not
/// fail an update the upstream already accepted.
async fn update_record_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<StatusUpdateOutcome>, HTTPError> {
    let outcome = state
        .upstream
        .update_record_status(&id, &request.new_status_id)
        .await
        .map_err(map_client_error)?;

    if state.store.is_enabled() {
        let entry = RelayAudit::new(&id, &request.new_status_id, "success");
        if let Err(e) = state.store.record_relay(&entry).await {
            warn!("Failed to record relay audit entry: {}", e);
        }
    }

    Ok(Json(outcome))
}
