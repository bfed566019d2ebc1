//! HTTP API handlers for karaoke-server
//!
//! JSON over HTTP. Errors use the shape `{"error": {"code", "message"}}`.

pub mod conversion;
pub mod health;
pub mod player;
pub mod queue;
pub mod settings;
pub mod videos;

pub use conversion::conversion_routes;
pub use health::health_routes;
pub use player::player_routes;
pub use queue::queue_routes;
pub use settings::settings_routes;
pub use videos::video_routes;
