use serde::{Deserialize, Serialize};

/// Library-wide counts for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub files: i64,
    pub scenes: i64,
    pub faces: i64,
    pub total_duration_secs: f64,
}

/// Vector coverage for one model. `scanned_none` counts scenes the stage
/// examined but that produced no input (silent scenes, posters without
/// faces), as opposed to scenes not yet scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCoverage {
    pub name: String,
    pub found: i64,
    pub scanned_none: i64,
    /// Percentage of non-deleted scenes carrying a vector, 0-100.
    pub coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStats {
    pub scenes: i64,
    pub models: Vec<ModelCoverage>,
}

/// Per-root mount status for the watch-folders endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchFolderStatus {
    pub path: String,
    pub mounted: bool,
}
