pub mod browse;
pub mod shares;
pub mod sources;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;

use crate::state::{AppState, HealthResponse};
use crate::streaming::stream_track;

pub fn api_router(state: AppState) -> Router {
    let artwork = ServeDir::new(state.artwork_dir.clone());

    Router::new()
        .route("/health", get(health))
        .route(
            "/sources",
            get(sources::list_sources).post(sources::create_source),
        )
        .route("/sources/test", post(sources::test_new_source))
        .route(
            "/sources/:source_id",
            get(sources::get_source)
                .patch(sources::update_source)
                .delete(sources::delete_source),
        )
        .route("/sources/:source_id/test", post(sources::test_source))
        .route("/sources/:source_id/scan", post(sources::scan_source))
        .route("/sources/:source_id/status", get(sources::source_status))
        .route("/scan", post(sources::scan_all))
        .route("/smb/enumerate-shares", post(shares::enumerate_shares))
        .route("/discover", get(browse::discovered))
        .route("/artists", get(browse::list_artists))
        .route("/tracks", get(browse::list_tracks))
        .route("/folders", get(browse::list_folders))
        .route("/folders/tracks", get(browse::folder_tracks))
        .route("/stream/:track_id", get(stream_track))
        .nest_service("/art", artwork)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
