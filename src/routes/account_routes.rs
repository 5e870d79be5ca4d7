//! Account lookup endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use crate::upstream::AccountInfo;
use crate::utils::{HTTPError, map_client_error};

/// Registers account lookup routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/accounts/:id", get(get_account))
}

/// Fetches an account from the upstream and forwards it.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountInfo>, HTTPError> {
    let account = state
        .upstream
        .get_account_info(&id)
        .await
        .map_err(map_client_error)?;
    Ok(Json(account))
}
