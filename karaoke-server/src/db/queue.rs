//! Queue store
//!
//! Ordered collection of pending song requests in the `queue` table.
//! Order is `(requested_at_ms, seq)`: arrival time with insertion order as
//! the tie-breaker. Positions are derived (1-based) on every listing and
//! never stored.
//!
//! All mutations run under one async mutex so that check-then-act sequences
//! (admission checks, ownership checks, pop racing remove) are linearizable.
//! Callers that need several steps under the same lock use [`QueueStore::lock`].

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use karaoke_common::db::QueueRow;
use karaoke_common::time;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// A pending song request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub requester: String,
    pub song_name: String,
    pub requested_at: DateTime<Utc>,
}

impl QueueEntry {
    fn from_row(row: QueueRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.guid)
            .map_err(|e| Error::Internal(format!("Invalid queue entry UUID '{}': {}", row.guid, e)))?;

        Ok(Self {
            id,
            requester: row.requester,
            song_name: row.song_name,
            requested_at: time::from_millis(row.requested_at_ms),
        })
    }
}

/// Queue entry annotated with its current 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionedEntry {
    pub position: usize,
    #[serde(flatten)]
    pub entry: QueueEntry,
}

/// SQLite-backed request queue
#[derive(Clone)]
pub struct QueueStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

/// Exclusive access to the queue for multi-step mutations
///
/// Holding a `QueueLock` blocks every other mutation on the same store.
pub struct QueueLock<'a> {
    pool: &'a SqlitePool,
    _guard: MutexGuard<'a, ()>,
}

impl QueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Acquire the queue write lock
    pub async fn lock(&self) -> QueueLock<'_> {
        QueueLock {
            pool: &self.pool,
            _guard: self.write_lock.lock().await,
        }
    }

    /// Append a new entry stamped with the current time
    pub async fn append(&self, requester: &str, song_name: &str) -> Result<QueueEntry> {
        self.lock().await.append_at(requester, song_name, time::now()).await
    }

    /// Append a new entry with an explicit arrival time
    pub async fn append_at(
        &self,
        requester: &str,
        song_name: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        self.lock().await.append_at(requester, song_name, requested_at).await
    }

    /// Front entry without removing it
    pub async fn peek_front(&self) -> Result<Option<QueueEntry>> {
        peek_front(&self.pool).await
    }

    /// Remove and return the front entry; `None` on an empty queue
    pub async fn pop_front(&self) -> Result<Option<QueueEntry>> {
        self.lock().await.pop_front().await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<QueueEntry>> {
        find_by_id(&self.pool, id).await
    }

    /// All entries of one requester in arrival order
    pub async fn find_all_by_requester(&self, requester: &str) -> Result<Vec<QueueEntry>> {
        find_all_by_requester(&self.pool, requester).await
    }

    /// Remove an entry; returns whether anything was removed
    pub async fn remove_by_id(&self, id: Uuid) -> Result<bool> {
        self.lock().await.remove_by_id(id).await
    }

    /// Rewrite the song of an entry owned by `requester`
    ///
    /// Fails with `NotFound` if the entry is gone and `Forbidden` if it
    /// belongs to someone else; the entry is unchanged in both cases.
    pub async fn update_song_name(
        &self,
        id: Uuid,
        new_song_name: &str,
        requester: &str,
    ) -> Result<QueueEntry> {
        let lock = self.lock().await;

        let entry = find_by_id(lock.pool, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Queue entry not found: {}", id)))?;

        if entry.requester != requester {
            return Err(Error::Forbidden(format!(
                "Queue entry {} belongs to another requester",
                id
            )));
        }

        lock.rewrite_song(id, new_song_name).await?;

        Ok(QueueEntry {
            song_name: new_song_name.to_string(),
            ..entry
        })
    }

    /// Snapshot of the queue in arrival order with 1-based positions
    pub async fn list_ordered(&self) -> Result<Vec<PositionedEntry>> {
        let entries = list_entries(&self.pool).await?;
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| PositionedEntry {
                position: index + 1,
                entry,
            })
            .collect())
    }

    /// Distinct song names currently queued
    pub async fn song_names(&self) -> Result<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT DISTINCT song_name FROM queue")
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().collect())
    }

    pub async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

impl QueueLock<'_> {
    pub async fn append_at(
        &self,
        requester: &str,
        song_name: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO queue (guid, requester, song_name, requested_at_ms) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(requester)
        .bind(song_name)
        .bind(time::to_millis(requested_at))
        .execute(self.pool)
        .await?;

        info!(entry_id = %id, requester, song_name, "Queue entry appended");

        Ok(QueueEntry {
            id,
            requester: requester.to_string(),
            song_name: song_name.to_string(),
            requested_at,
        })
    }

    pub async fn has_entry_for(&self, requester: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM queue WHERE requester = ?)")
            .bind(requester)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Earliest entry of `requester`, if any
    pub async fn first_entry_for(&self, requester: &str) -> Result<Option<QueueEntry>> {
        Ok(find_all_by_requester(self.pool, requester).await?.into_iter().next())
    }

    /// Replace the song of an entry in place; its position is unchanged
    pub async fn rewrite_song(&self, id: Uuid, song_name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE queue SET song_name = ? WHERE guid = ?")
            .bind(song_name)
            .bind(id.to_string())
            .execute(self.pool)
            .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(entry_id = %id, song_name, "Queue entry song rewritten");
        }
        Ok(updated)
    }

    pub async fn peek_front(&self) -> Result<Option<QueueEntry>> {
        peek_front(self.pool).await
    }

    pub async fn pop_front(&self) -> Result<Option<QueueEntry>> {
        let row: Option<QueueRow> = sqlx::query_as(
            r#"
            DELETE FROM queue
            WHERE seq = (SELECT seq FROM queue ORDER BY requested_at_ms, seq LIMIT 1)
            RETURNING seq, guid, requester, song_name, requested_at_ms
            "#,
        )
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => {
                let entry = QueueEntry::from_row(row)?;
                info!(entry_id = %entry.id, song_name = %entry.song_name, "Queue front popped");
                Ok(Some(entry))
            }
            None => {
                debug!("Pop on empty queue");
                Ok(None)
            }
        }
    }

    pub async fn remove_by_id(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queue WHERE guid = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(entry_id = %id, "Queue entry removed");
        }
        Ok(removed)
    }
}

async fn peek_front(pool: &SqlitePool) -> Result<Option<QueueEntry>> {
    let row: Option<QueueRow> = sqlx::query_as(
        r#"
        SELECT seq, guid, requester, song_name, requested_at_ms
        FROM queue
        ORDER BY requested_at_ms, seq
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    row.map(QueueEntry::from_row).transpose()
}

async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<QueueEntry>> {
    let row: Option<QueueRow> = sqlx::query_as(
        "SELECT seq, guid, requester, song_name, requested_at_ms FROM queue WHERE guid = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(QueueEntry::from_row).transpose()
}

async fn find_all_by_requester(pool: &SqlitePool, requester: &str) -> Result<Vec<QueueEntry>> {
    let rows: Vec<QueueRow> = sqlx::query_as(
        r#"
        SELECT seq, guid, requester, song_name, requested_at_ms
        FROM queue
        WHERE requester = ?
        ORDER BY requested_at_ms, seq
        "#,
    )
    .bind(requester)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(QueueEntry::from_row).collect()
}

async fn list_entries(pool: &SqlitePool) -> Result<Vec<QueueEntry>> {
    let rows: Vec<QueueRow> = sqlx::query_as(
        r#"
        SELECT seq, guid, requester, song_name, requested_at_ms
        FROM queue
        ORDER BY requested_at_ms, seq
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(QueueEntry::from_row).collect()
}
