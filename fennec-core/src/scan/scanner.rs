use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::media::probe::probe_file;
use crate::store::Store;
use crate::types::file::{NewVideoFile, VideoFile, VideoProbe};
use crate::types::progress::{ScanPhase, ScanProgressTracker, ScanSummary};

/// Recognized video extensions, matched case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "3gp", "3g2", "avi", "mkv", "webm", "mxf", "wmv", "asf", "flv", "ts",
    "m2ts", "mts", "mpg", "mpeg", "vob", "ogv", "rm", "rmvb", "wtv", "dv", "mj2", "bik", "bk2",
];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_lowercase();
            VIDEO_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// How a discovered file relates to its stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    New,
    Updated,
    Unchanged,
    Revived,
}

/// Pure classification against the stored row; timestamps compare with a
/// one-second tolerance for filesystem precision.
fn classify(
    existing: Option<(&VideoFile, i64, Option<DateTime<Utc>>)>,
) -> Classification {
    let Some((row, size, mtime)) = existing else {
        return Classification::New;
    };

    let same_size = row.size_bytes == size;
    let same_mtime = match (row.fs_modified_at, mtime) {
        (Some(a), Some(b)) => (a - b).num_seconds().abs() <= 1,
        (None, None) => true,
        _ => false,
    };

    if row.is_deleted() {
        if same_size && same_mtime {
            Classification::Revived
        } else {
            Classification::Updated
        }
    } else if same_size && same_mtime {
        Classification::Unchanged
    } else {
        Classification::Updated
    }
}

#[derive(Clone, Debug)]
pub struct Scanner {
    store: Store,
    progress: Arc<ScanProgressTracker>,
}

impl Scanner {
    pub fn new(store: Store, progress: Arc<ScanProgressTracker>) -> Self {
        Self { store, progress }
    }

    /// Run one full reconciliation pass over the watch roots. Per-file
    /// errors are logged and skipped; the scan itself does not abort.
    pub async fn scan(&self, watch_roots: &[String]) -> Result<ScanSummary> {
        let started = Instant::now();
        self.progress.reset();
        self.progress.set_phase(ScanPhase::Discovering);
        info!(roots = watch_roots.len(), "scan starting");

        let discovered = {
            let roots = watch_roots.to_vec();
            let progress = self.progress.clone();
            tokio::task::spawn_blocking(move || discover_roots(&roots, &progress))
                .await
                .map_err(|e| {
                    crate::error::FennecError::Internal(format!("discovery task failed: {e}"))
                })?
        };

        self.progress.set_phase(ScanPhase::Processing);
        let mut seen: HashSet<String> = HashSet::with_capacity(discovered.len());
        for path in &discovered {
            let key = path.to_string_lossy().into_owned();
            if let Err(e) = self.process_file(path).await {
                warn!("skipping {}: {e}", path.display());
                // Counted as processed so phase totals stay consistent.
                self.progress.add_skipped();
            }
            seen.insert(key);
        }

        self.progress.set_phase(ScanPhase::CheckingMissing);
        let mut missing = 0u64;
        for (id, path) in self.store.files().list_active_paths().await? {
            if !seen.contains(&path) {
                debug!("marking missing: {path}");
                self.store.files().mark_missing(id).await?;
                missing += 1;
            }
        }

        self.progress.set_phase(ScanPhase::Complete);
        self.progress.set_current_folder(None);

        let snap = self.progress.snapshot();
        let summary = ScanSummary {
            finished_at: Utc::now(),
            duration_secs: started.elapsed().as_secs_f64(),
            files_found: snap.files_found,
            files_new: snap.files_new,
            files_updated: snap.files_updated,
            files_skipped: snap.files_skipped,
            files_missing: missing,
        };

        self.store
            .config()
            .set_raw(
                crate::settings::keys::LAST_SCAN,
                &serde_json::to_value(&summary)?,
            )
            .await?;

        info!(
            found = summary.files_found,
            new = summary.files_new,
            updated = summary.files_updated,
            skipped = summary.files_skipped,
            missing = summary.files_missing,
            "scan complete in {:.1}s",
            summary.duration_secs
        );
        Ok(summary)
    }

    async fn process_file(&self, path: &Path) -> Result<()> {
        let meta = tokio::fs::metadata(path).await?;
        let size = meta.len() as i64;
        let mtime = meta.modified().ok().map(system_time_to_utc);
        let ctime = meta.created().ok().map(system_time_to_utc);

        let path_str = path.to_string_lossy().into_owned();
        let existing = self.store.files().get_by_path(&path_str).await?;

        match classify(existing.as_ref().map(|row| (row, size, mtime))) {
            Classification::Unchanged => {
                self.progress.add_skipped();
            }
            Classification::New => {
                let probe = self.probe(path).await;
                let mut new_file = NewVideoFile::from_path(path, size);
                new_file.fs_created_at = ctime;
                new_file.fs_modified_at = mtime;
                new_file.probe = probe;

                let row = self.store.files().insert(&new_file).await?;
                self.store.queue().enqueue(row.id).await?;
                self.progress.add_new();
            }
            Classification::Updated => {
                let row = existing.expect("updated implies existing");
                let probe = self.probe(path).await;
                self.store
                    .files()
                    .update_metadata(row.id, size, mtime, &probe)
                    .await?;
                // The old cover no longer matches the new content.
                self.store.scenes().delete_for_file(row.id).await?;
                self.store.queue().enqueue(row.id).await?;
                self.progress.add_updated();
            }
            Classification::Revived => {
                let row = existing.expect("revived implies existing");
                let probe = self.probe(path).await;
                self.store
                    .files()
                    .update_metadata(row.id, size, mtime, &probe)
                    .await?;
                self.store.queue().enqueue(row.id).await?;
                self.progress.add_new();
            }
        }

        Ok(())
    }

    /// Probe on the blocking pool. Failure leaves the row unenriched;
    /// the pipeline's metadata stage retries and records the error.
    async fn probe(&self, path: &Path) -> VideoProbe {
        let owned = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || probe_file(&owned)).await;
        match result {
            Ok(Ok(probe)) => probe,
            Ok(Err(e)) => {
                warn!("probe failed for {}: {e}", path.display());
                VideoProbe::default()
            }
            Err(e) => {
                warn!("probe task panicked for {}: {e}", path.display());
                VideoProbe::default()
            }
        }
    }
}

/// Phase `discovering`: enumerate the roots, counting directories and
/// matching files. Runs on the blocking pool; unreadable paths are
/// skipped, not fatal.
fn discover_roots(watch_roots: &[String], progress: &ScanProgressTracker) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in watch_roots {
        let root_path = Path::new(root);
        if !root_path.is_dir() {
            warn!("watch root not mounted: {root}");
            continue;
        }
        for entry in WalkDir::new(root_path).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("walk error under {root}: {e}");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                progress.add_directory();
                progress.set_current_folder(Some(entry.path().to_string_lossy().into_owned()));
                continue;
            }
            if is_video_file(entry.path()) {
                progress.add_found();
                files.push(entry.into_path());
            }
        }
    }
    files
}

fn system_time_to_utc(time: std::time::SystemTime) -> DateTime<Utc> {
    let duration = time
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Utc.timestamp_opt(duration.as_secs() as i64, duration.subsec_nanos())
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert!(is_video_file(Path::new("clip.mp4")));
        assert!(is_video_file(Path::new("CLIP.MKV")));
        assert!(is_video_file(Path::new("tape.M2TS")));
        assert!(is_video_file(Path::new("old.rmvb")));
        assert!(!is_video_file(Path::new("poster.jpg")));
        assert!(!is_video_file(Path::new("notes.txt")));
        assert!(!is_video_file(Path::new("no_extension")));
    }

    fn row(size: i64, mtime: Option<DateTime<Utc>>, deleted: bool) -> VideoFile {
        VideoFile {
            id: 1,
            path: "/media/a.mp4".into(),
            filename: "a.mp4".into(),
            folder: "media".into(),
            duration_secs: Some(10.0),
            width: Some(1920),
            height: Some(1080),
            fps: Some(25.0),
            codec: Some("h264".into()),
            audio_tracks: Some(1),
            pixel_format: None,
            color_space: None,
            color_transfer: None,
            color_primaries: None,
            size_bytes: size,
            fs_created_at: None,
            fs_modified_at: mtime,
            tags: vec![],
            created_at: Utc::now(),
            indexed_at: None,
            deleted_at: deleted.then(Utc::now),
        }
    }

    #[test]
    fn absent_row_is_new() {
        assert_eq!(classify(None), Classification::New);
    }

    #[test]
    fn matching_size_and_mtime_is_unchanged() {
        let mtime = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let row = row(100, Some(mtime), false);
        assert_eq!(
            classify(Some((&row, 100, Some(mtime)))),
            Classification::Unchanged
        );
    }

    #[test]
    fn sub_second_mtime_drift_is_tolerated() {
        let stored = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let observed = stored + chrono::Duration::milliseconds(600);
        let row = row(100, Some(stored), false);
        assert_eq!(
            classify(Some((&row, 100, Some(observed)))),
            Classification::Unchanged
        );
    }

    #[test]
    fn size_change_is_updated() {
        let mtime = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let row = row(100, Some(mtime), false);
        assert_eq!(
            classify(Some((&row, 200, Some(mtime)))),
            Classification::Updated
        );
    }

    #[test]
    fn soft_deleted_row_revives() {
        let mtime = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let row = row(100, Some(mtime), true);
        assert_eq!(
            classify(Some((&row, 100, Some(mtime)))),
            Classification::Revived
        );
        assert_eq!(
            classify(Some((&row, 999, Some(mtime)))),
            Classification::Updated
        );
    }
}
