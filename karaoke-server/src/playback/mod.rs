//! Playback coordination
//!
//! A single playback slot per process, driven by the player through
//! peek → commit → finish.

pub mod arbiter;

pub use arbiter::{PlaybackArbiter, PlaybackError, Preview, SlotSnapshot, SlotState};
