use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::discovery::DiscoveredService;
use crate::state::{AppState, JsonResult};
use crate::utils::{blocking, json_error};
use common::{Artist, Folder, Track};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderTracksQuery {
    pub path: Option<String>,
    pub source_id: Option<String>,
}

pub async fn list_artists(State(state): State<AppState>) -> JsonResult<Vec<Artist>> {
    let catalog = state.catalog.clone();
    let artists = blocking(move || catalog.list_artists()).await?;
    Ok(Json(artists))
}

pub async fn list_tracks(State(state): State<AppState>) -> JsonResult<Vec<Track>> {
    let catalog = state.catalog.clone();
    let tracks = blocking(move || catalog.list_all_tracks()).await?;
    Ok(Json(tracks))
}

pub async fn list_folders(State(state): State<AppState>) -> JsonResult<Vec<Folder>> {
    let catalog = state.catalog.clone();
    let folders = blocking(move || catalog.list_folders()).await?;
    Ok(Json(folders))
}

pub async fn folder_tracks(
    State(state): State<AppState>,
    Query(query): Query<FolderTracksQuery>,
) -> JsonResult<Vec<Track>> {
    let path = query
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "path is required"))?;
    let source_id = query.source_id.filter(|id| !id.is_empty());
    let catalog = state.catalog.clone();
    let tracks = blocking(move || catalog.tracks_in_folder(&path, source_id.as_deref())).await?;
    Ok(Json(tracks))
}

pub async fn discovered(State(state): State<AppState>) -> Json<Vec<DiscoveredService>> {
    Json(state.discovery.services())
}
