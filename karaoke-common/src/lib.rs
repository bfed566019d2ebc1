//! # Karaoke Common Library
//!
//! Shared code for the karaoke queue service:
//! - Error type used by database and configuration helpers
//! - Configuration loading and root folder resolution
//! - Database initialization (schema + default settings)
//! - Row models for the queue, play log and settings tables
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
