//! Queue endpoints
//!
//! GET /api/queue, POST /api/queue/add, POST /api/queue/set,
//! PUT|DELETE /api/queue/:id, GET /api/queue/requester/:name

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admission::SetOrSwapOutcome;
use crate::db::{PositionedEntry, QueueEntry};
use crate::error::{Error, Result};
use crate::AppState;

/// Body for add, set and change requests
#[derive(Debug, Deserialize)]
pub struct SongRequest {
    pub requester: String,
    pub song_name: String,
}

#[derive(Debug, Serialize)]
pub struct SetSongResponse {
    pub outcome: SetOrSwapOutcome,
    pub entry: QueueEntry,
}

/// GET /api/queue
pub async fn list_queue(State(state): State<AppState>) -> Result<Json<Vec<PositionedEntry>>> {
    Ok(Json(state.queue.list_ordered().await?))
}

/// POST /api/queue/add
///
/// 409 when the requester already has a queued song and duplicate
/// prevention is on.
pub async fn add_song(
    State(state): State<AppState>,
    Json(request): Json<SongRequest>,
) -> Result<(StatusCode, Json<QueueEntry>)> {
    let entry = state
        .admission
        .submit(&request.requester, &request.song_name)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST /api/queue/set
pub async fn set_song(
    State(state): State<AppState>,
    Json(request): Json<SongRequest>,
) -> Result<Json<SetSongResponse>> {
    let (entry, outcome) = state
        .admission
        .set_or_swap(&request.requester, &request.song_name)
        .await?;
    Ok(Json(SetSongResponse { outcome, entry }))
}

/// PUT /api/queue/:id
pub async fn change_song(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<SongRequest>,
) -> Result<Json<QueueEntry>> {
    let entry = state
        .admission
        .change_own_song(entry_id, &request.requester, &request.song_name)
        .await?;
    Ok(Json(entry))
}

/// DELETE /api/queue/:id
pub async fn remove_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.queue.remove_by_id(entry_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("Queue entry not found: {}", entry_id)))
    }
}

/// GET /api/queue/requester/:name
pub async fn requester_entries(
    State(state): State<AppState>,
    Path(requester): Path<String>,
) -> Result<Json<Vec<QueueEntry>>> {
    Ok(Json(state.queue.find_all_by_requester(&requester).await?))
}

pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/api/queue", get(list_queue))
        .route("/api/queue/add", post(add_song))
        .route("/api/queue/set", post(set_song))
        .route("/api/queue/:id", put(change_song).delete(remove_entry))
        .route("/api/queue/requester/:name", get(requester_entries))
}
