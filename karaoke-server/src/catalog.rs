//! Video catalog
//!
//! Lists the playable videos in the converted-videos folder. An unconfigured
//! or missing folder is an empty catalog, not an error.

use std::path::Path;
use tracing::{debug, warn};

/// Extensions the playback device can play (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov"];

/// Whether `file_name` has a playable extension
pub fn is_supported_video(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// File names of playable videos in `folder`, sorted by name
pub async fn list_videos(folder: &Path) -> Vec<String> {
    let mut dir = match tokio::fs::read_dir(folder).await {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Video folder {} unavailable: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    loop {
        match dir.next_entry().await {
            Ok(Some(entry)) => {
                let is_file = entry
                    .file_type()
                    .await
                    .map(|t| t.is_file())
                    .unwrap_or(false);
                if !is_file {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if is_supported_video(name) {
                        names.push(name.to_string());
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading video folder {}: {}", folder.display(), e);
                break;
            }
        }
    }

    names.sort();
    debug!("Catalog has {} videos in {}", names.len(), folder.display());
    names
}
