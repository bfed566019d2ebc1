//! karaoke-server library interface
//!
//! Queue, admission, playback arbitration, play log, settings and video
//! conversion for a karaoke venue, served over HTTP.

pub mod admission;
pub mod api;
pub mod catalog;
pub mod conversion;
pub mod db;
pub mod error;
pub mod playback;

pub use crate::error::{Error, Result};

use crate::admission::AdmissionPolicy;
use crate::conversion::ConversionPipeline;
use crate::db::{PlayLogger, QueueStore, SettingRegistry};
use crate::playback::PlaybackArbiter;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
///
/// One instance per process; every component inside is a cheap handle to
/// shared state.
#[derive(Clone)]
pub struct AppState {
    pub queue: QueueStore,
    pub settings: SettingRegistry,
    pub play_log: PlayLogger,
    pub admission: AdmissionPolicy,
    pub arbiter: Arc<PlaybackArbiter>,
    pub conversion: ConversionPipeline,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire all components onto one pool; media defaults live under `root_folder`
    pub fn new(db: SqlitePool, root_folder: &Path) -> Self {
        let queue = QueueStore::new(db.clone());
        let settings = SettingRegistry::new(db.clone(), root_folder);
        let play_log = PlayLogger::new(db);
        let admission = AdmissionPolicy::new(queue.clone(), settings.clone(), play_log.clone());
        let arbiter = Arc::new(PlaybackArbiter::new(queue.clone(), settings.clone()));
        let conversion = ConversionPipeline::new(settings.clone());

        Self {
            queue,
            settings,
            play_log,
            admission,
            arbiter,
            conversion,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::queue_routes())
        .merge(api::player_routes())
        .merge(api::video_routes())
        .merge(api::settings_routes())
        .merge(api::conversion_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
