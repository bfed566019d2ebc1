//! Database models

use serde::{Deserialize, Serialize};

/// Row of the `queue` table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueRow {
    /// Insertion sequence, tie-breaker for equal timestamps
    pub seq: i64,
    pub guid: String,
    pub requester: String,
    pub song_name: String,
    pub requested_at_ms: i64,
}

/// Row of the `play_log` table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayLogRow {
    pub id: i64,
    pub song_name: String,
    pub played_at_ms: i64,
}
