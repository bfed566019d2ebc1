//! Setting registry
//!
//! Flat string key/value store in the `settings` table with typed accessors.
//! Every accessor has a default: an absent key yields the default, and an
//! unparsable stored value is logged and also yields the default.

use crate::error::{Error, Result};
use karaoke_common::config::{default_converted_videos_path, default_original_videos_path};
use karaoke_common::db::ensure_setting;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

pub const PREVENT_DUPLICATES_KEY: &str = "prevent_duplicate_requester";
pub const COOLDOWN_HOURS_KEY: &str = "song_cooldown_hours";
pub const CONFIRMATION_TIMEOUT_KEY: &str = "confirmation_timeout_seconds";
pub const ORIGINAL_VIDEOS_PATH_KEY: &str = "original_videos_path";
pub const CONVERTED_VIDEOS_PATH_KEY: &str = "converted_videos_path";
pub const TRANSCODER_PATH_KEY: &str = "transcoder_path";

pub const DEFAULT_PREVENT_DUPLICATES: bool = true;
pub const DEFAULT_COOLDOWN_HOURS: i64 = 0;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECONDS: u64 = 20;
pub const DEFAULT_TRANSCODER_PATH: &str = "ffmpeg";

/// Upper bound for the cooldown window (one year)
const MAX_COOLDOWN_HOURS: i64 = 8760;

/// Upper bound for the operator confirmation countdown
const MAX_CONFIRMATION_TIMEOUT_SECONDS: u64 = 3600;

/// Metadata for one registry key
pub struct SettingMetadata {
    pub key: &'static str,
    pub data_type: &'static str,
    pub description: &'static str,
    pub validator: fn(&str) -> std::result::Result<(), String>,
}

/// Validation rules for every key the registry writes
pub fn metadata() -> &'static [SettingMetadata] {
    &[
        SettingMetadata {
            key: PREVENT_DUPLICATES_KEY,
            data_type: "bool",
            description: "Reject a second queue entry from a requester who already has one",
            validator: |s| parse_bool(s).map(|_| ()).ok_or_else(|| format!("{}: expected true or false", PREVENT_DUPLICATES_KEY)),
        },
        SettingMetadata {
            key: COOLDOWN_HOURS_KEY,
            data_type: "i64",
            description: "Hours a played song stays unavailable (0 disables the cooldown)",
            validator: |s| {
                let v: i64 = s
                    .trim()
                    .parse()
                    .map_err(|_| format!("{}: invalid number format", COOLDOWN_HOURS_KEY))?;
                if !(0..=MAX_COOLDOWN_HOURS).contains(&v) {
                    return Err(format!(
                        "{}: value {} out of range [0, {}]",
                        COOLDOWN_HOURS_KEY, v, MAX_COOLDOWN_HOURS
                    ));
                }
                Ok(())
            },
        },
        SettingMetadata {
            key: CONFIRMATION_TIMEOUT_KEY,
            data_type: "u64",
            description: "Seconds the operator has to confirm a peeked song",
            validator: |s| {
                let v: u64 = s
                    .trim()
                    .parse()
                    .map_err(|_| format!("{}: invalid number format", CONFIRMATION_TIMEOUT_KEY))?;
                if !(1..=MAX_CONFIRMATION_TIMEOUT_SECONDS).contains(&v) {
                    return Err(format!(
                        "{}: value {} out of range [1, {}]",
                        CONFIRMATION_TIMEOUT_KEY, v, MAX_CONFIRMATION_TIMEOUT_SECONDS
                    ));
                }
                Ok(())
            },
        },
        SettingMetadata {
            key: ORIGINAL_VIDEOS_PATH_KEY,
            data_type: "path",
            description: "Folder of source videos awaiting conversion",
            validator: non_empty,
        },
        SettingMetadata {
            key: CONVERTED_VIDEOS_PATH_KEY,
            data_type: "path",
            description: "Folder of playable videos; also the song catalog",
            validator: non_empty,
        },
        SettingMetadata {
            key: TRANSCODER_PATH_KEY,
            data_type: "path",
            description: "Transcoder executable (absolute path or name on PATH)",
            validator: non_empty,
        },
    ]
}

fn non_empty(s: &str) -> std::result::Result<(), String> {
    if s.trim().is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Validate a value against the registry metadata for `key`
pub fn validate(key: &str, value: &str) -> Result<()> {
    let meta = metadata()
        .iter()
        .find(|m| m.key == key)
        .ok_or_else(|| Error::BadRequest(format!("Unknown setting: {}", key)))?;
    (meta.validator)(value).map_err(Error::BadRequest)
}

/// Typed view of all registry values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KaraokeSettings {
    pub prevent_duplicates: bool,
    pub cooldown_hours: i64,
    pub confirmation_timeout_seconds: u64,
    pub original_videos_path: PathBuf,
    pub converted_videos_path: PathBuf,
    pub transcoder_path: String,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub prevent_duplicates: Option<bool>,
    pub cooldown_hours: Option<i64>,
    pub confirmation_timeout_seconds: Option<u64>,
    pub original_videos_path: Option<PathBuf>,
    pub converted_videos_path: Option<PathBuf>,
    pub transcoder_path: Option<String>,
}

impl SettingsPatch {
    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(v) = self.prevent_duplicates {
            entries.push((PREVENT_DUPLICATES_KEY, v.to_string()));
        }
        if let Some(v) = self.cooldown_hours {
            entries.push((COOLDOWN_HOURS_KEY, v.to_string()));
        }
        if let Some(v) = self.confirmation_timeout_seconds {
            entries.push((CONFIRMATION_TIMEOUT_KEY, v.to_string()));
        }
        if let Some(v) = &self.original_videos_path {
            entries.push((ORIGINAL_VIDEOS_PATH_KEY, v.to_string_lossy().into_owned()));
        }
        if let Some(v) = &self.converted_videos_path {
            entries.push((CONVERTED_VIDEOS_PATH_KEY, v.to_string_lossy().into_owned()));
        }
        if let Some(v) = &self.transcoder_path {
            entries.push((TRANSCODER_PATH_KEY, v.clone()));
        }
        entries
    }
}

/// Database-backed setting registry
#[derive(Clone)]
pub struct SettingRegistry {
    pool: SqlitePool,
    default_original_path: PathBuf,
    default_converted_path: PathBuf,
}

impl SettingRegistry {
    /// Create a registry whose path defaults live under `root_folder`
    pub fn new(pool: SqlitePool, root_folder: &Path) -> Self {
        Self {
            pool,
            default_original_path: default_original_videos_path(root_folder),
            default_converted_path: default_converted_videos_path(root_folder),
        }
    }

    /// Write defaults for missing keys without touching existing values
    pub async fn seed_defaults(&self) -> Result<()> {
        info!("Initializing default settings");

        let defaults = [
            (PREVENT_DUPLICATES_KEY, DEFAULT_PREVENT_DUPLICATES.to_string()),
            (COOLDOWN_HOURS_KEY, DEFAULT_COOLDOWN_HOURS.to_string()),
            (CONFIRMATION_TIMEOUT_KEY, DEFAULT_CONFIRMATION_TIMEOUT_SECONDS.to_string()),
            (ORIGINAL_VIDEOS_PATH_KEY, self.default_original_path.to_string_lossy().into_owned()),
            (CONVERTED_VIDEOS_PATH_KEY, self.default_converted_path.to_string_lossy().into_owned()),
            (TRANSCODER_PATH_KEY, DEFAULT_TRANSCODER_PATH.to_string()),
        ];

        for (key, value) in defaults {
            ensure_setting(&self.pool, key, &value).await?;
        }
        Ok(())
    }

    /// Raw string value, `None` when absent or NULL
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.flatten())
    }

    /// Insert or update a raw value after validating it
    pub async fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        validate(key, value)?;
        upsert(&self.pool, key, value).await
    }

    /// Stored values are re-validated; rows written around `set_raw` may be out of range
    async fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(default);
        };
        if let Err(e) = validate(key, &raw) {
            warn!("Setting '{}' has invalid value '{}' ({}), using default", key, raw, e);
            return Ok(default);
        }
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                warn!("Setting '{}' has unparsable value '{}', using default", key, raw);
                Ok(default)
            }
        }
    }

    async fn get_path(&self, key: &str, default: &Path) -> Result<PathBuf> {
        match self.get_raw(key).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(PathBuf::from(raw.trim())),
            _ => Ok(default.to_path_buf()),
        }
    }

    pub async fn prevent_duplicates(&self) -> Result<bool> {
        match self.get_raw(PREVENT_DUPLICATES_KEY).await? {
            Some(raw) => Ok(parse_bool(&raw).unwrap_or_else(|| {
                warn!("Setting '{}' has unparsable value '{}', using default", PREVENT_DUPLICATES_KEY, raw);
                DEFAULT_PREVENT_DUPLICATES
            })),
            None => Ok(DEFAULT_PREVENT_DUPLICATES),
        }
    }

    pub async fn cooldown_hours(&self) -> Result<i64> {
        self.get_parsed(COOLDOWN_HOURS_KEY, DEFAULT_COOLDOWN_HOURS).await
    }

    pub async fn confirmation_timeout_seconds(&self) -> Result<u64> {
        self.get_parsed(CONFIRMATION_TIMEOUT_KEY, DEFAULT_CONFIRMATION_TIMEOUT_SECONDS)
            .await
    }

    pub async fn original_videos_path(&self) -> Result<PathBuf> {
        self.get_path(ORIGINAL_VIDEOS_PATH_KEY, &self.default_original_path).await
    }

    pub async fn converted_videos_path(&self) -> Result<PathBuf> {
        self.get_path(CONVERTED_VIDEOS_PATH_KEY, &self.default_converted_path).await
    }

    pub async fn transcoder_path(&self) -> Result<String> {
        match self.get_raw(TRANSCODER_PATH_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
            _ => Ok(DEFAULT_TRANSCODER_PATH.to_string()),
        }
    }

    /// Current values with defaults applied
    pub async fn snapshot(&self) -> Result<KaraokeSettings> {
        Ok(KaraokeSettings {
            prevent_duplicates: self.prevent_duplicates().await?,
            cooldown_hours: self.cooldown_hours().await?,
            confirmation_timeout_seconds: self.confirmation_timeout_seconds().await?,
            original_videos_path: self.original_videos_path().await?,
            converted_videos_path: self.converted_videos_path().await?,
            transcoder_path: self.transcoder_path().await?,
        })
    }

    /// Validate every field of `patch`, then write them in one transaction
    pub async fn apply_patch(&self, patch: &SettingsPatch) -> Result<KaraokeSettings> {
        let entries = patch.entries();
        for (key, value) in &entries {
            validate(key, value)?;
        }

        let mut tx = self.pool.begin().await?;
        for (key, value) in &entries {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(*key)
            .bind(value.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        if !entries.is_empty() {
            let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
            info!(keys = ?keys, "Settings updated");
        }

        self.snapshot().await
    }
}

async fn upsert(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
