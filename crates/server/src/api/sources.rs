use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::scan::{start_scan, start_scan_all, AlreadyRunning};
use crate::state::{
    AppState, CreateSourceRequest, JsonResult, MessageResponse, ScanAllResponse, SourceResponse,
    TestConnectionResponse, UpdateSourceRequest,
};
use crate::utils::{blocking, internal_error, json_error, json_error_response, non_blank};
use common::{now_timestamp, Source, SourceKind, SourceStatus};
use library::{NewSource, SourcePatch};
use remote::test_connection;

pub async fn list_sources(State(state): State<AppState>) -> JsonResult<Vec<SourceResponse>> {
    let catalog = state.catalog.clone();
    let sources = blocking(move || catalog.list_sources_with_status())
        .await?
        .into_iter()
        .map(|(source, status)| SourceResponse { source, status })
        .collect();
    Ok(Json(sources))
}

pub async fn create_source(
    State(state): State<AppState>,
    Json(payload): Json<CreateSourceRequest>,
) -> Result<(StatusCode, Json<SourceResponse>), Response> {
    let new = validate_new_source(payload).map_err(|msg| json_error_response(StatusCode::BAD_REQUEST, msg))?;
    let catalog = state.catalog.clone();
    let (source, status) = blocking(move || {
        let source = catalog.create_source(new)?;
        let status = catalog.get_status(&source.id)?;
        Ok((source, status))
    })
    .await
    .map_err(IntoResponse::into_response)?;
    info!("Added {} source {} ({})", source.kind.as_str(), source.name, source.id);

    if source.enabled {
        let _ = start_scan(&state, source.clone());
    }
    Ok((StatusCode::CREATED, Json(SourceResponse { source, status })))
}

pub async fn get_source(
    State(state): State<AppState>,
    AxumPath(source_id): AxumPath<String>,
) -> JsonResult<SourceResponse> {
    let catalog = state.catalog.clone();
    let found = blocking(move || {
        let Some(source) = catalog.get_source(&source_id)? else {
            return Ok(None);
        };
        let status = catalog.get_status(&source_id)?;
        Ok(Some(SourceResponse { source, status }))
    })
    .await?;
    found
        .map(Json)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "source not found"))
}

pub async fn update_source(
    State(state): State<AppState>,
    AxumPath(source_id): AxumPath<String>,
    Json(payload): Json<UpdateSourceRequest>,
) -> JsonResult<SourceResponse> {
    let patch = validate_patch(payload).map_err(|msg| json_error(StatusCode::BAD_REQUEST, msg))?;
    let catalog = state.catalog.clone();
    let updated = blocking(move || {
        let Some(source) = catalog.update_source(&source_id, patch)? else {
            return Ok(None);
        };
        let status = catalog.get_status(&source_id)?;
        Ok(Some(SourceResponse { source, status }))
    })
    .await?;
    updated
        .map(Json)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "source not found"))
}

pub async fn delete_source(
    State(state): State<AppState>,
    AxumPath(source_id): AxumPath<String>,
) -> Response {
    let catalog = state.catalog.clone();
    let id = source_id.clone();
    match blocking(move || catalog.delete_source(&id)).await {
        Ok(true) => {
            info!("Removed source {}", source_id);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => json_error_response(StatusCode::NOT_FOUND, "source not found"),
        Err(err) => err.into_response(),
    }
}

pub async fn test_source(
    State(state): State<AppState>,
    AxumPath(source_id): AxumPath<String>,
) -> JsonResult<TestConnectionResponse> {
    let catalog = state.catalog.clone();
    let source = blocking(move || catalog.get_source(&source_id))
        .await?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "source not found"))?;
    run_connection_test(&state, source).await
}

/// Tests a source body before it is saved.
pub async fn test_new_source(
    State(state): State<AppState>,
    Json(payload): Json<CreateSourceRequest>,
) -> JsonResult<TestConnectionResponse> {
    let new = validate_new_source(payload).map_err(|msg| json_error(StatusCode::BAD_REQUEST, msg))?;
    let now = now_timestamp();
    let source = Source {
        id: String::new(),
        name: new.name,
        kind: new.kind,
        host: new.host,
        port: new.port.filter(|p| *p != 0).unwrap_or(new.kind.default_port()),
        username: new.username,
        password: new.password,
        domain: new.domain,
        share: new.share,
        base_path: new.base_path,
        enabled: new.enabled,
        created_at: now.clone(),
        updated_at: now,
    };
    run_connection_test(&state, source).await
}

async fn run_connection_test(
    state: &AppState,
    source: Source,
) -> JsonResult<TestConnectionResponse> {
    let connector = Arc::clone(&state.connector);
    let result = tokio::task::spawn_blocking(move || test_connection(connector.as_ref(), &source))
        .await
        .map_err(internal_error)?;
    let response = match result {
        Ok(_) => TestConnectionResponse {
            success: true,
            message: "Connection successful".to_string(),
        },
        Err(err) => TestConnectionResponse {
            success: false,
            message: err.to_string(),
        },
    };
    Ok(Json(response))
}

pub async fn scan_source(
    State(state): State<AppState>,
    AxumPath(source_id): AxumPath<String>,
) -> Result<(StatusCode, Json<MessageResponse>), Response> {
    let catalog = state.catalog.clone();
    let source = blocking(move || catalog.get_source(&source_id))
        .await
        .map_err(IntoResponse::into_response)?
        .ok_or_else(|| json_error_response(StatusCode::NOT_FOUND, "source not found"))?;
    match start_scan(&state, source) {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(MessageResponse {
                message: "Scan started".to_string(),
            }),
        )),
        Err(AlreadyRunning) => Err(json_error_response(
            StatusCode::CONFLICT,
            "scan already in progress",
        )),
    }
}

pub async fn scan_all(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ScanAllResponse>), Response> {
    let scan_state = state.clone();
    let summary = blocking(move || start_scan_all(&scan_state))
        .await
        .map_err(IntoResponse::into_response)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ScanAllResponse {
            message: format!("Started {} scan(s)", summary.started),
            started: summary.started,
            skipped: summary.skipped,
        }),
    ))
}

pub async fn source_status(
    State(state): State<AppState>,
    AxumPath(source_id): AxumPath<String>,
) -> JsonResult<SourceStatus> {
    let catalog = state.catalog.clone();
    blocking(move || catalog.get_status(&source_id))
        .await?
        .map(Json)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "status not found"))
}

fn parse_kind(value: &str) -> Result<SourceKind, String> {
    SourceKind::parse(value).ok_or_else(|| format!("unsupported source type: {}", value))
}

fn validate_new_source(payload: CreateSourceRequest) -> Result<NewSource, String> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    let host = payload.host.trim().to_string();
    if host.is_empty() {
        return Err("host is required".to_string());
    }
    let kind = parse_kind(&payload.kind)?;
    Ok(NewSource {
        name,
        kind,
        host,
        port: payload.port,
        username: non_blank(payload.username),
        password: payload.password.filter(|p| !p.is_empty()),
        domain: non_blank(payload.domain),
        share: non_blank(payload.share),
        base_path: non_blank(payload.base_path),
        enabled: payload.enabled.unwrap_or(true),
    })
}

fn validate_patch(payload: UpdateSourceRequest) -> Result<SourcePatch, String> {
    let name = match payload.name {
        Some(name) if name.trim().is_empty() => return Err("name cannot be empty".to_string()),
        other => other.map(|n| n.trim().to_string()),
    };
    let host = match payload.host {
        Some(host) if host.trim().is_empty() => return Err("host cannot be empty".to_string()),
        other => other.map(|h| h.trim().to_string()),
    };
    let kind = payload.kind.as_deref().map(parse_kind).transpose()?;
    Ok(SourcePatch {
        name,
        kind,
        host,
        port: payload.port,
        username: payload.username.map(non_blank),
        password: payload.password.map(|p| p.filter(|p| !p.is_empty())),
        domain: payload.domain.map(non_blank),
        share: payload.share.map(non_blank),
        base_path: payload.base_path.map(non_blank),
        enabled: payload.enabled,
    })
}
