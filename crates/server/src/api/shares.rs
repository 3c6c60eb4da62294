use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use tracing::warn;

use crate::state::{AppState, EnumerateSharesRequest, JsonResult};
use crate::utils::{internal_error, json_error, non_blank};
use remote::{RemoteError, ShareQuery};

const LOGON_FAILURE: &str = "Logon failure: Check your username and password. \
    If using a Mac, try leaving the Domain field blank.";

pub async fn enumerate_shares(
    State(state): State<AppState>,
    Json(payload): Json<EnumerateSharesRequest>,
) -> JsonResult<Vec<String>> {
    let host = payload.host.trim().to_string();
    if host.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "host is required"));
    }
    let query = ShareQuery {
        host,
        username: non_blank(payload.username),
        password: payload.password.filter(|p| !p.is_empty()),
        domain: non_blank(payload.domain),
    };

    let connector = Arc::clone(&state.connector);
    let result = tokio::task::spawn_blocking(move || connector.enumerate_shares(&query))
        .await
        .map_err(internal_error)?;
    match result {
        Ok(shares) => Ok(Json(shares)),
        Err(err) if err.is_auth() => Err(json_error(StatusCode::UNAUTHORIZED, LOGON_FAILURE)),
        Err(RemoteError::Invalid(message)) => Err(json_error(StatusCode::BAD_REQUEST, message)),
        Err(err) => {
            warn!("Share enumeration failed: {}", err);
            Err(internal_error(err))
        }
    }
}
