//! Database access layer
//!
//! Repositories for the queue, the play log and the setting registry.

pub mod play_log;
pub mod queue;
pub mod settings;

pub use play_log::{PlayLogger, PlayRecord};
pub use queue::{PositionedEntry, QueueEntry, QueueLock, QueueStore};
pub use settings::{KaraokeSettings, SettingRegistry, SettingsPatch};
