// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for saved photos

use crate::config::Config;
use crate::constants::app_info::APP_DIR_NAME;
use crate::errors::PhotoError;
use crate::pipelines::photo::JPEG_EXTENSION;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory saved photos go to
///
/// The configured directory wins; otherwise `~/Pictures/simple-camera`.
pub fn photo_directory(config: &Config) -> PathBuf {
    if let Some(dir) = &config.photo_directory {
        return dir.clone();
    }
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Timestamped file name for a photo taken at `time`
pub fn photo_filename(time: DateTime<Local>) -> String {
    format!("IMG_{}.{}", time.format("%Y%m%d_%H%M%S"), JPEG_EXTENSION)
}

/// First free path for `file_name` in `dir`
///
/// Two photos within the same second get `_1`, `_2`, ... suffixes.
fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, JPEG_EXTENSION)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Save encoded photo bytes under a timestamped name in `output_dir`
pub async fn save_photo(data: Vec<u8>, output_dir: PathBuf) -> Result<PathBuf, PhotoError> {
    tokio::fs::create_dir_all(&output_dir).await?;
    let filepath = unique_path(&output_dir, &photo_filename(Local::now()));
    save_photo_to(data, filepath).await
}

/// Save encoded photo bytes to an exact path
pub async fn save_photo_to(data: Vec<u8>, filepath: PathBuf) -> Result<PathBuf, PhotoError> {
    if let Some(parent) = filepath.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    info!(path = %filepath.display(), size = data.len(), "Saving photo");
    tokio::fs::write(&filepath, &data).await?;
    Ok(filepath)
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            ["jpg", "jpeg", "png"]
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Most recently modified photo in `photos_dir`
pub async fn latest_photo(photos_dir: PathBuf) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(&photos_dir).await.ok()?;
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !is_photo(&path) {
            continue;
        }
        let Some(modified) = entry.metadata().await.ok().and_then(|m| m.modified().ok()) else {
            continue;
        };
        if latest.as_ref().is_none_or(|(time, _)| modified > *time) {
            latest = Some((modified, path));
        }
    }

    let latest = latest.map(|(_, path)| path);
    debug!(path = ?latest, "Latest photo");
    latest
}

/// Open a saved photo in the desktop's default viewer
pub fn open_in_viewer(path: &Path) -> Result<(), PhotoError> {
    open::that_detached(path)
        .map_err(|e| PhotoError::SaveFailed(format!("cannot open {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_photo_filename_format() {
        let time = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(photo_filename(time), "IMG_20240309_070501.jpg");
    }

    #[test]
    fn test_configured_directory_wins() {
        let config = Config {
            photo_directory: Some(PathBuf::from("/tmp/shots")),
            ..Config::default()
        };
        assert_eq!(photo_directory(&config), PathBuf::from("/tmp/shots"));
    }

    #[test]
    fn test_unique_path_adds_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_1.jpg"), b"x").unwrap();
        assert_eq!(unique_path(dir.path(), "IMG_1.jpg"), dir.path().join("IMG_1_1.jpg"));
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        let path = save_photo(vec![0xFF, 0xD8, 0xFF, 0xD9], target.clone()).await.unwrap();
        assert!(path.starts_with(&target));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn test_latest_photo_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        assert!(latest_photo(dir.path().to_path_buf()).await.is_none());
        std::fs::write(dir.path().join("IMG_a.jpg"), b"x").unwrap();
        assert_eq!(
            latest_photo(dir.path().to_path_buf()).await,
            Some(dir.path().join("IMG_a.jpg"))
        );
    }
}
