use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A video file row as stored in `video_files`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoFile {
    pub id: i64,
    pub path: String,
    pub filename: String,
    /// Immediate parent folder name, used for display grouping.
    pub folder: String,
    pub duration_secs: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub fps: Option<f64>,
    pub codec: Option<String>,
    pub audio_tracks: Option<i32>,
    pub pixel_format: Option<String>,
    pub color_space: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
    pub size_bytes: i64,
    pub fs_created_at: Option<DateTime<Utc>>,
    pub fs_modified_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl VideoFile {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Technical metadata probed from a container before insert or refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoProbe {
    pub duration_secs: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub fps: Option<f64>,
    pub codec: Option<String>,
    pub audio_tracks: Option<i32>,
    pub pixel_format: Option<String>,
    pub color_space: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
}

/// Insert payload built by the scanner for a newly discovered file.
#[derive(Debug, Clone)]
pub struct NewVideoFile {
    pub path: String,
    pub filename: String,
    pub folder: String,
    pub size_bytes: i64,
    pub fs_created_at: Option<DateTime<Utc>>,
    pub fs_modified_at: Option<DateTime<Utc>>,
    pub probe: VideoProbe,
}

impl NewVideoFile {
    pub fn from_path(path: &Path, size_bytes: i64) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let folder = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path: path.to_string_lossy().into_owned(),
            filename,
            folder,
            size_bytes,
            fs_created_at: None,
            fs_modified_at: None,
            probe: VideoProbe::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn new_file_derives_name_and_folder() {
        let path = PathBuf::from("/media/clips/holiday/beach.mp4");
        let new = NewVideoFile::from_path(&path, 42);

        assert_eq!(new.filename, "beach.mp4");
        assert_eq!(new.folder, "holiday");
        assert_eq!(new.size_bytes, 42);
    }
}
