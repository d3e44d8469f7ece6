use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Phase of the in-flight scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Discovering,
    Processing,
    CheckingMissing,
    Complete,
}

impl ScanPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ScanPhase::Discovering,
            2 => ScanPhase::Processing,
            3 => ScanPhase::CheckingMissing,
            4 => ScanPhase::Complete,
            _ => ScanPhase::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ScanPhase::Idle => 0,
            ScanPhase::Discovering => 1,
            ScanPhase::Processing => 2,
            ScanPhase::CheckingMissing => 3,
            ScanPhase::Complete => 4,
        }
    }
}

/// Snapshot of the in-flight scan published to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_folder: Option<String>,
    pub directories_scanned: u64,
    pub files_found: u64,
    pub files_processed: u64,
    pub files_new: u64,
    pub files_updated: u64,
    pub files_skipped: u64,
}

/// Shared counters the scan task bumps while walking; snapshot on demand.
/// Lives for the process lifetime, one scan at a time.
#[derive(Debug, Default)]
pub struct ScanProgressTracker {
    phase: AtomicU8,
    current_folder: RwLock<Option<String>>,
    directories_scanned: AtomicU64,
    files_found: AtomicU64,
    files_processed: AtomicU64,
    files_new: AtomicU64,
    files_updated: AtomicU64,
    files_skipped: AtomicU64,
}

impl ScanProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_phase(&self, phase: ScanPhase) {
        self.phase.store(phase.as_u8(), Ordering::Relaxed);
    }

    pub fn set_current_folder(&self, folder: Option<String>) {
        *self.current_folder.write().expect("progress lock poisoned") = folder;
    }

    pub fn reset(&self) {
        self.set_phase(ScanPhase::Idle);
        self.set_current_folder(None);
        for counter in [
            &self.directories_scanned,
            &self.files_found,
            &self.files_processed,
            &self.files_new,
            &self.files_updated,
            &self.files_skipped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn add_directory(&self) {
        self.directories_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_found(&self) {
        self.files_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_new(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.files_new.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_updated(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.files_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_skipped(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            phase: ScanPhase::from_u8(self.phase.load(Ordering::Relaxed)),
            current_folder: self
                .current_folder
                .read()
                .expect("progress lock poisoned")
                .clone(),
            directories_scanned: self.directories_scanned.load(Ordering::Relaxed),
            files_found: self.files_found.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_new: self.files_new.load(Ordering::Relaxed),
            files_updated: self.files_updated.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Result of a completed scan, persisted under the `last_scan` config key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub files_found: u64,
    pub files_new: u64,
    pub files_updated: u64,
    pub files_skipped: u64,
    pub files_missing: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_consistent() {
        let tracker = ScanProgressTracker::new();
        tracker.set_phase(ScanPhase::Processing);
        tracker.add_new();
        tracker.add_updated();
        tracker.add_skipped();
        tracker.add_skipped();

        let snap = tracker.snapshot();
        assert_eq!(snap.phase, ScanPhase::Processing);
        assert_eq!(
            snap.files_processed,
            snap.files_new + snap.files_updated + snap.files_skipped
        );
    }

    #[test]
    fn reset_clears_everything() {
        let tracker = ScanProgressTracker::new();
        tracker.set_phase(ScanPhase::Complete);
        tracker.add_found();
        tracker.reset();

        let snap = tracker.snapshot();
        assert_eq!(snap.phase, ScanPhase::Idle);
        assert_eq!(snap.files_found, 0);
    }
}
