//! Song catalog and play log endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::catalog;
use crate::db::PlayRecord;
use crate::error::{Error, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlayedRequest {
    pub song_name: String,
}

/// GET /api/videos
///
/// Catalog minus queued songs minus songs still in cooldown.
pub async fn available_videos(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let folder = state.settings.converted_videos_path().await?;
    let videos = catalog::list_videos(&folder).await;
    Ok(Json(state.admission.available_songs(&videos).await?))
}

/// POST /api/log/played
pub async fn record_played(
    State(state): State<AppState>,
    Json(request): Json<PlayedRequest>,
) -> Result<(StatusCode, Json<PlayRecord>)> {
    let song_name = request.song_name.trim();
    if song_name.is_empty() {
        return Err(Error::BadRequest("song_name must not be empty".to_string()));
    }

    let record = state.play_log.record(song_name).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub fn video_routes() -> Router<AppState> {
    Router::new()
        .route("/api/videos", get(available_videos))
        .route("/api/log/played", post(record_played))
}
