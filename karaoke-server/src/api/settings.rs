//! Settings endpoints

use axum::{extract::State, routing::get, Json, Router};

use crate::db::{KaraokeSettings, SettingsPatch};
use crate::error::Result;
use crate::AppState;

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<KaraokeSettings>> {
    Ok(Json(state.settings.snapshot().await?))
}

/// POST /api/settings
///
/// Fields left out are unchanged. One invalid field rejects the whole
/// update with 400 and nothing is written.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<KaraokeSettings>> {
    Ok(Json(state.settings.apply_patch(&patch).await?))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).post(update_settings))
}
