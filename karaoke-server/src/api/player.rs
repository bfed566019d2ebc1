//! Player endpoints
//!
//! The player polls `peek-next`; "nothing to do" and "slot busy" both come
//! back as an empty object so idle polling never surfaces an error.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::db::QueueEntry;
use crate::error::Result;
use crate::playback::SlotSnapshot;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    pub skipped: Option<QueueEntry>,
}

#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub finished: Option<QueueEntry>,
}

/// GET /api/player/peek-next
pub async fn peek_next(State(state): State<AppState>) -> Result<Json<Value>> {
    match state.arbiter.peek().await {
        Ok(Some(preview)) => Ok(Json(json!(preview))),
        Ok(None) => Ok(Json(json!({}))),
        Err(e) if e.is_idle_rejection() => {
            debug!(reason = %e, "Peek ignored");
            Ok(Json(json!({})))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/player/play-next
///
/// 409 while a song is playing, 404 when the queue is empty.
pub async fn play_next(State(state): State<AppState>) -> Result<Json<QueueEntry>> {
    Ok(Json(state.arbiter.commit().await?))
}

/// POST /api/player/skip
pub async fn skip(State(state): State<AppState>) -> Result<Json<SkipResponse>> {
    let skipped = state.arbiter.skip().await?;
    Ok(Json(SkipResponse { skipped }))
}

/// POST /api/player/finished
pub async fn finished(State(state): State<AppState>) -> Json<FinishResponse> {
    let finished = state.arbiter.finish().await;
    Json(FinishResponse { finished })
}

/// GET /api/player/status
pub async fn status(State(state): State<AppState>) -> Json<SlotSnapshot> {
    Json(state.arbiter.status().await)
}

pub fn player_routes() -> Router<AppState> {
    Router::new()
        .route("/api/player/peek-next", get(peek_next))
        .route("/api/player/play-next", post(play_next))
        .route("/api/player/skip", post(skip))
        .route("/api/player/finished", post(finished))
        .route("/api/player/status", get(status))
}
