//! Play log
//!
//! Append-only record of completed plays, read by the cooldown filter.
//! Rows are never updated or deleted here.

use crate::error::Result;
use chrono::{DateTime, Utc};
use karaoke_common::db::PlayLogRow;
use karaoke_common::time;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

/// One completed play
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRecord {
    pub song_name: String,
    pub played_at: DateTime<Utc>,
}

impl From<PlayLogRow> for PlayRecord {
    fn from(row: PlayLogRow) -> Self {
        Self {
            song_name: row.song_name,
            played_at: time::from_millis(row.played_at_ms),
        }
    }
}

#[derive(Clone)]
pub struct PlayLogger {
    pool: SqlitePool,
}

impl PlayLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a play at the current time
    pub async fn record(&self, song_name: &str) -> Result<PlayRecord> {
        self.record_at(song_name, time::now()).await
    }

    /// Record a play at an explicit time
    ///
    /// Storage failures propagate to the caller.
    pub async fn record_at(&self, song_name: &str, played_at: DateTime<Utc>) -> Result<PlayRecord> {
        sqlx::query("INSERT INTO play_log (song_name, played_at_ms) VALUES (?, ?)")
            .bind(song_name)
            .bind(time::to_millis(played_at))
            .execute(&self.pool)
            .await?;

        info!(song_name, played_at = %played_at, "Play recorded");

        Ok(PlayRecord {
            song_name: song_name.to_string(),
            played_at,
        })
    }

    /// Plays at or after `since` (inclusive); order is unspecified
    pub async fn since(&self, since: DateTime<Utc>) -> Result<Vec<PlayRecord>> {
        let rows: Vec<PlayLogRow> = sqlx::query_as(
            "SELECT id, song_name, played_at_ms FROM play_log WHERE played_at_ms >= ?",
        )
        .bind(time::to_millis(since))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PlayRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use karaoke_common::db::init_memory_database;

    #[tokio::test]
    async fn test_since_is_inclusive_at_threshold() {
        let logger = PlayLogger::new(init_memory_database().await.unwrap());
        let t = time::from_millis(1_757_000_000_000);

        logger.record_at("before.mp4", t - Duration::milliseconds(1)).await.unwrap();
        logger.record_at("exact.mp4", t).await.unwrap();
        logger.record_at("after.mp4", t + Duration::minutes(5)).await.unwrap();

        let mut names: Vec<_> = logger
            .since(t)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.song_name)
            .collect();
        names.sort();

        assert_eq!(names, vec!["after.mp4", "exact.mp4"]);
    }

    #[tokio::test]
    async fn test_record_appends_duplicates() {
        let logger = PlayLogger::new(init_memory_database().await.unwrap());
        let t = time::from_millis(1_757_000_000_000);

        logger.record_at("a.mp4", t).await.unwrap();
        logger.record_at("a.mp4", t).await.unwrap();

        assert_eq!(logger.since(t).await.unwrap().len(), 2);
    }
}
