//! Playback arbiter
//!
//! State machine guarding the playback slot:
//!
//! ```text
//! Idle --peek--> Peeked --commit--> Playing --finish--> Idle
//!   \_____________commit_____________/         |
//!                 Peeked --skip--> Idle <------+
//! ```
//!
//! Every transition is one critical section under the slot mutex, so two
//! concurrent commits can never both observe a non-playing slot. The
//! confirmation deadline is only exposed; the arbiter never transitions on
//! time by itself. The player acts on an expired deadline by calling skip.
//!
//! Lock order is slot, then queue. Nothing that holds the queue lock ever
//! waits on the slot.

use crate::db::{QueueEntry, QueueStore, SettingRegistry};
use crate::error::Error;
use chrono::{DateTime, Duration, Utc};
use karaoke_common::time;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Typed rejection from a transition the current state forbids
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("A song is already playing")]
    AlreadyPlaying,

    #[error("A song is awaiting operator confirmation")]
    AwaitingConfirmation,

    #[error("No song is awaiting confirmation")]
    NotPeeked,

    #[error("The queue is empty")]
    QueueEmpty,

    #[error(transparent)]
    Store(#[from] Error),
}

impl PlaybackError {
    /// Rejections a polling player treats as "nothing to do"
    pub fn is_idle_rejection(&self) -> bool {
        matches!(
            self,
            PlaybackError::AlreadyPlaying | PlaybackError::AwaitingConfirmation
        )
    }
}

impl From<PlaybackError> for Error {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::AlreadyPlaying
            | PlaybackError::AwaitingConfirmation
            | PlaybackError::NotPeeked => Error::Conflict(err.to_string()),
            PlaybackError::QueueEmpty => Error::NotFound(err.to_string()),
            PlaybackError::Store(e) => e,
        }
    }
}

pub type PlaybackResult<T> = std::result::Result<T, PlaybackError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Peeked {
        entry: QueueEntry,
        deadline: DateTime<Utc>,
    },
    Playing {
        entry: QueueEntry,
    },
}

impl SlotState {
    pub fn name(&self) -> &'static str {
        match self {
            SlotState::Idle => "idle",
            SlotState::Peeked { .. } => "peeked",
            SlotState::Playing { .. } => "playing",
        }
    }
}

/// What the player shows during the confirmation countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub entry_id: uuid::Uuid,
    pub song_name: String,
    pub requester: String,
    pub timeout_seconds: u64,
}

/// Point-in-time view of the slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub state: &'static str,
    pub entry: Option<QueueEntry>,
    pub deadline: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    pub expired: bool,
}

pub struct PlaybackArbiter {
    queue: QueueStore,
    settings: SettingRegistry,
    slot: Mutex<SlotState>,
}

impl PlaybackArbiter {
    pub fn new(queue: QueueStore, settings: SettingRegistry) -> Self {
        Self {
            queue,
            settings,
            slot: Mutex::new(SlotState::Idle),
        }
    }

    /// Preview the queue head and start the confirmation countdown
    ///
    /// Only valid from `Idle`. An empty queue leaves the slot idle and
    /// returns `None`.
    pub async fn peek(&self) -> PlaybackResult<Option<Preview>> {
        self.peek_at(time::now()).await
    }

    pub async fn peek_at(&self, now: DateTime<Utc>) -> PlaybackResult<Option<Preview>> {
        let mut slot = self.slot.lock().await;

        match &*slot {
            SlotState::Idle => {}
            SlotState::Peeked { .. } => return Err(PlaybackError::AwaitingConfirmation),
            SlotState::Playing { .. } => return Err(PlaybackError::AlreadyPlaying),
        }

        let Some(entry) = self.queue.peek_front().await? else {
            return Ok(None);
        };

        let timeout_seconds = self.settings.confirmation_timeout_seconds().await?;
        let deadline = now + Duration::seconds(timeout_seconds as i64);

        info!(
            entry_id = %entry.id,
            song_name = %entry.song_name,
            requester = %entry.requester,
            deadline = %deadline,
            "Next song peeked"
        );

        let preview = Preview {
            entry_id: entry.id,
            song_name: entry.song_name.clone(),
            requester: entry.requester.clone(),
            timeout_seconds,
        };
        *slot = SlotState::Peeked { entry, deadline };

        Ok(Some(preview))
    }

    /// Pop the queue head and start playing it
    ///
    /// Valid from `Idle` or `Peeked`. Rejected with `AlreadyPlaying` while a
    /// song plays; `QueueEmpty` leaves the state unchanged.
    pub async fn commit(&self) -> PlaybackResult<QueueEntry> {
        let mut slot = self.slot.lock().await;

        if let SlotState::Playing { entry } = &*slot {
            debug!(entry_id = %entry.id, "Commit rejected: already playing");
            return Err(PlaybackError::AlreadyPlaying);
        }

        let Some(entry) = self.queue.pop_front().await? else {
            return Err(PlaybackError::QueueEmpty);
        };

        if let SlotState::Peeked { entry: peeked, .. } = &*slot {
            if peeked.id != entry.id {
                warn!(
                    peeked = %peeked.id,
                    committed = %entry.id,
                    "Queue head changed between peek and commit"
                );
            }
        }

        info!(entry_id = %entry.id, song_name = %entry.song_name, "Playback started");
        *slot = SlotState::Playing {
            entry: entry.clone(),
        };

        Ok(entry)
    }

    /// Return to `Idle`; tolerated from any state
    ///
    /// Returns the entry that was playing, if any.
    pub async fn finish(&self) -> Option<QueueEntry> {
        let mut slot = self.slot.lock().await;

        match std::mem::replace(&mut *slot, SlotState::Idle) {
            SlotState::Playing { entry } => {
                info!(entry_id = %entry.id, song_name = %entry.song_name, "Playback finished");
                Some(entry)
            }
            SlotState::Peeked { entry, .. } => {
                debug!(entry_id = %entry.id, "Finish while awaiting confirmation; peek dropped");
                None
            }
            SlotState::Idle => {
                debug!("Finish while idle ignored");
                None
            }
        }
    }

    /// Discard the peeked head and return to `Idle`
    ///
    /// Only valid from `Peeked`. The entry is removed only if it is still
    /// the queue head; otherwise the slot just returns to `Idle` and `None`
    /// is returned.
    pub async fn skip(&self) -> PlaybackResult<Option<QueueEntry>> {
        let mut slot = self.slot.lock().await;

        let peeked = match &*slot {
            SlotState::Peeked { entry, .. } => entry.clone(),
            SlotState::Playing { .. } => return Err(PlaybackError::AlreadyPlaying),
            SlotState::Idle => return Err(PlaybackError::NotPeeked),
        };

        let discarded = {
            let queue = self.queue.lock().await;
            match queue.peek_front().await? {
                Some(front) if front.id == peeked.id => queue.remove_by_id(front.id).await?,
                _ => false,
            }
        };

        *slot = SlotState::Idle;

        if discarded {
            info!(entry_id = %peeked.id, song_name = %peeked.song_name, "Peeked song skipped");
            Ok(Some(peeked))
        } else {
            debug!(entry_id = %peeked.id, "Skip found a different queue head; nothing removed");
            Ok(None)
        }
    }

    pub async fn status(&self) -> SlotSnapshot {
        self.status_at(time::now()).await
    }

    pub async fn status_at(&self, now: DateTime<Utc>) -> SlotSnapshot {
        let slot = self.slot.lock().await;

        match &*slot {
            SlotState::Idle => SlotSnapshot {
                state: slot.name(),
                entry: None,
                deadline: None,
                remaining_seconds: None,
                expired: false,
            },
            SlotState::Peeked { entry, deadline } => {
                let remaining = (*deadline - now).num_seconds().max(0);
                SlotSnapshot {
                    state: slot.name(),
                    entry: Some(entry.clone()),
                    deadline: Some(*deadline),
                    remaining_seconds: Some(remaining),
                    expired: now >= *deadline,
                }
            }
            SlotState::Playing { entry } => SlotSnapshot {
                state: slot.name(),
                entry: Some(entry.clone()),
                deadline: None,
                remaining_seconds: None,
                expired: false,
            },
        }
    }

    /// Current state (cloned)
    pub async fn state(&self) -> SlotState {
        self.slot.lock().await.clone()
    }
}
