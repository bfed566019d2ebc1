//! Conversion endpoints
//!
//! POST /api/conversion/start, GET /api/conversion/status,
//! POST /api/conversion/cancel

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::conversion::ConversionStatus;
use crate::error::Result;
use crate::AppState;

/// POST /api/conversion/start
///
/// Returns 202 once the run is launched; progress is read from the status
/// endpoint. 409 while a run is in progress.
pub async fn start_conversion(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ConversionStatus>)> {
    state.conversion.start().await?;
    info!("Conversion run accepted");
    Ok((StatusCode::ACCEPTED, Json(state.conversion.status().await)))
}

/// GET /api/conversion/status
pub async fn conversion_status(State(state): State<AppState>) -> Json<ConversionStatus> {
    Json(state.conversion.status().await)
}

/// POST /api/conversion/cancel
///
/// The file being converted finishes first; 409 when nothing is running.
pub async fn cancel_conversion(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ConversionStatus>)> {
    state.conversion.cancel().await?;
    Ok((StatusCode::ACCEPTED, Json(state.conversion.status().await)))
}

pub fn conversion_routes() -> Router<AppState> {
    Router::new()
        .route("/api/conversion/start", post(start_conversion))
        .route("/api/conversion/status", get(conversion_status))
        .route("/api/conversion/cancel", post(cancel_conversion))
}
