//! Admission policy
//!
//! Decides whether a request may enter the queue and which catalog songs
//! are currently selectable.
//!
//! - Duplicate prevention (default on): at most one queued entry per requester.
//! - Cooldown (default 0 = disabled): songs played within the last
//!   `song_cooldown_hours` are not selectable. The window is inclusive at
//!   `now - cooldown`.
//! - Songs already anywhere in the queue are not selectable.

use crate::db::{PlayLogger, QueueEntry, QueueStore, SettingRegistry};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use karaoke_common::time;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// What `set_or_swap` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOrSwapOutcome {
    Appended,
    Swapped,
}

#[derive(Clone)]
pub struct AdmissionPolicy {
    queue: QueueStore,
    settings: SettingRegistry,
    play_log: PlayLogger,
}

fn require_non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

impl AdmissionPolicy {
    pub fn new(queue: QueueStore, settings: SettingRegistry, play_log: PlayLogger) -> Self {
        Self {
            queue,
            settings,
            play_log,
        }
    }

    /// Submit a request; `Conflict` when duplicate-blocked
    pub async fn submit(&self, requester: &str, song_name: &str) -> Result<QueueEntry> {
        self.submit_at(requester, song_name, time::now()).await
    }

    pub async fn submit_at(
        &self,
        requester: &str,
        song_name: &str,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let requester = require_non_empty("requester", requester)?;
        let song_name = require_non_empty("song_name", song_name)?;
        let prevent_duplicates = self.settings.prevent_duplicates().await?;

        let lock = self.queue.lock().await;
        if prevent_duplicates && lock.has_entry_for(&requester).await? {
            info!(requester = %requester, "Submission rejected: requester already queued");
            return Err(Error::Conflict(format!(
                "{} already has a song in the queue",
                requester
            )));
        }

        lock.append_at(&requester, &song_name, now).await
    }

    /// Append, or rewrite the requester's existing entry in place
    ///
    /// With duplicate prevention on and an existing entry, the earliest
    /// entry of the requester gets the new song and keeps its position.
    /// Otherwise a new entry is appended.
    pub async fn set_or_swap(
        &self,
        requester: &str,
        song_name: &str,
    ) -> Result<(QueueEntry, SetOrSwapOutcome)> {
        self.set_or_swap_at(requester, song_name, time::now()).await
    }

    pub async fn set_or_swap_at(
        &self,
        requester: &str,
        song_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(QueueEntry, SetOrSwapOutcome)> {
        let requester = require_non_empty("requester", requester)?;
        let song_name = require_non_empty("song_name", song_name)?;
        let prevent_duplicates = self.settings.prevent_duplicates().await?;

        let lock = self.queue.lock().await;
        if prevent_duplicates {
            if let Some(existing) = lock.first_entry_for(&requester).await? {
                lock.rewrite_song(existing.id, &song_name).await?;
                return Ok((
                    QueueEntry {
                        song_name,
                        ..existing
                    },
                    SetOrSwapOutcome::Swapped,
                ));
            }
        }

        let entry = lock.append_at(&requester, &song_name, now).await?;
        Ok((entry, SetOrSwapOutcome::Appended))
    }

    /// Change the song of an entry the requester owns
    pub async fn change_own_song(
        &self,
        entry_id: Uuid,
        requester: &str,
        new_song_name: &str,
    ) -> Result<QueueEntry> {
        let requester = require_non_empty("requester", requester)?;
        let new_song_name = require_non_empty("song_name", new_song_name)?;
        self.queue
            .update_song_name(entry_id, &new_song_name, &requester)
            .await
    }

    /// Catalog minus queued songs minus songs in cooldown, in catalog order
    pub async fn available_songs(&self, catalog: &[String]) -> Result<Vec<String>> {
        self.available_songs_at(catalog, time::now()).await
    }

    pub async fn available_songs_at(
        &self,
        catalog: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if catalog.is_empty() {
            return Ok(Vec::new());
        }

        let queued = self.queue.song_names().await?;

        let cooldown_hours = self.settings.cooldown_hours().await?;
        let cooling: HashSet<String> = if cooldown_hours > 0 {
            let threshold = now - Duration::hours(cooldown_hours);
            self.play_log
                .since(threshold)
                .await?
                .into_iter()
                .map(|record| record.song_name)
                .collect()
        } else {
            HashSet::new()
        };

        let available: Vec<String> = catalog
            .iter()
            .filter(|song| !queued.contains(*song) && !cooling.contains(*song))
            .cloned()
            .collect();

        debug!(
            catalog = catalog.len(),
            queued = queued.len(),
            cooling = cooling.len(),
            available = available.len(),
            "Computed available songs"
        );

        Ok(available)
    }
}
