//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed TOML file is never fatal: it is logged and the
//! remaining tiers are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "KARAOKE_ROOT_FOLDER";

/// Environment variable naming an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "KARAOKE_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "karaoke.db";

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. "info" or "karaoke_server=debug"
    pub level: Option<String>,
}

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TomlConfig {
    /// Root folder holding the database and default media folders
    pub root_folder: Option<PathBuf>,

    /// HTTP listen port
    pub port: Option<u16>,

    /// HTTP bind address
    pub bind: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Write a TOML config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load the TOML config, degrading to defaults when absent or unreadable
///
/// An explicit path (CLI or `KARAOKE_CONFIG`) is tried first, then the
/// platform config locations.
pub fn load_toml_config_or_default(explicit: Option<&Path>) -> (TomlConfig, ConfigSource) {
    let candidate = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from))
        .or_else(default_config_file);

    let Some(path) = candidate else {
        return (TomlConfig::default(), ConfigSource::Defaults);
    };

    match load_toml_config(&path) {
        Ok(config) => (config, ConfigSource::File(path)),
        Err(e) => (
            TomlConfig::default(),
            ConfigSource::Ignored {
                path,
                reason: e.to_string(),
            },
        ),
    }
}

/// Where the effective TOML config came from
///
/// Loading happens before the tracing subscriber exists, so the outcome is
/// returned and logged by the caller once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    File(PathBuf),
    Ignored { path: PathBuf, reason: String },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::Defaults => info!("No config file found, using defaults"),
            ConfigSource::File(path) => info!("Loaded config file: {}", path.display()),
            ConfigSource::Ignored { path, reason } => {
                warn!("Ignoring config file {}: {}", path.display(), reason)
            }
        }
    }
}

/// Resolve the root folder following the four-tier priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Create the root folder if needed and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(root_folder.join(DATABASE_FILE_NAME))
}

/// Default original (untranscoded) media folder for a root folder
pub fn default_original_videos_path(root_folder: &Path) -> PathBuf {
    root_folder.join("videos").join("original")
}

/// Default converted (playable) media folder for a root folder
pub fn default_converted_videos_path(root_folder: &Path) -> PathBuf {
    root_folder.join("videos").join("converted")
}

/// Get the platform config file path if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("karaoke").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/karaoke/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("karaoke"))
        .unwrap_or_else(|| PathBuf::from("./karaoke_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };

        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_default_media_paths_live_under_root() {
        let root = Path::new("/srv/karaoke");
        assert_eq!(
            default_original_videos_path(root),
            PathBuf::from("/srv/karaoke/videos/original")
        );
        assert_eq!(
            default_converted_videos_path(root),
            PathBuf::from("/srv/karaoke/videos/converted")
        );
    }

    #[test]
    fn test_logging_level_optional() {
        let config: TomlConfig = toml::from_str("port = 6000").unwrap();
        assert_eq!(config.port, Some(6000));
        assert!(config.logging.level.is_none());
        assert!(config.root_folder.is_none());
    }
}
