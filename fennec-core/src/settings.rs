//! Runtime switches persisted in the store's key/value config table.
//!
//! Process-level bootstrap (database URL, bind address, data dir) comes
//! from flags and environment; everything the UI can toggle lives here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod keys {
    pub const INDEXER_STATE: &str = "indexer_state";
    pub const POLL_INTERVAL_SECONDS: &str = "poll_interval_seconds";
    pub const WATCH_FOLDERS: &str = "watch_folders";
    pub const ENRICHMENT_MODELS: &str = "enrichment_models";
    pub const POSTER_WIDTH: &str = "poster_width";
    pub const POSTER_QUALITY: &str = "poster_quality";
    pub const POSTER_FORMAT: &str = "poster_format";
    pub const SEARCH_THRESHOLD_VISUAL: &str = "search_threshold_visual";
    pub const SEARCH_THRESHOLD_VISUAL_MATCH: &str = "search_threshold_visual_match";
    pub const SEARCH_THRESHOLD_FACE: &str = "search_threshold_face";
    pub const SEARCH_THRESHOLD_TRANSCRIPT: &str = "search_threshold_transcript";
    pub const MODEL_VERSIONS: &str = "model_versions";
    pub const LAST_SCAN: &str = "last_scan";
    pub const SCAN_STATUS: &str = "scan_status";
    /// Set by the admin surface; the ingest loop exits at its next
    /// boundary so a supervisor restart re-examines remounted roots.
    pub const RESTART_REQUESTED: &str = "restart_requested";
}

/// Whether the ingest scheduler drains the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerState {
    Running,
    Paused,
}

/// Per-model enable flags driving the pipeline's stage set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichmentModels {
    pub clip: bool,
    pub whisper: bool,
    pub arcface: bool,
}

impl Default for EnrichmentModels {
    fn default() -> Self {
        Self {
            clip: true,
            whisper: true,
            arcface: true,
        }
    }
}

/// Version + dimension registry entry for one model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSpec {
    pub version: String,
    pub dimension: i32,
}

pub type ModelRegistry = BTreeMap<String, ModelSpec>;

pub fn default_model_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.insert(
        "clip".to_string(),
        ModelSpec {
            version: "ViT-B-32".to_string(),
            dimension: 512,
        },
    );
    registry.insert(
        "transcript".to_string(),
        ModelSpec {
            version: "MiniLM-L6-v2".to_string(),
            dimension: 384,
        },
    );
    registry.insert(
        "arcface".to_string(),
        ModelSpec {
            version: "arcface-r100".to_string(),
            dimension: 512,
        },
    );
    // Speech-to-text produces text, not vectors; dimension 0 keeps the
    // entry addressable for version display without a vector match.
    registry.insert(
        "whisper".to_string(),
        ModelSpec {
            version: "base".to_string(),
            dimension: 0,
        },
    );
    registry
}

/// Poster output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PosterSettings {
    pub width: u32,
    pub quality: u8,
    pub format: String,
}

impl Default for PosterSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            quality: 80,
            format: "jpg".to_string(),
        }
    }
}

/// Per-clause similarity floors, all in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SearchThresholds {
    pub visual: f64,
    pub visual_match: f64,
    pub face: f64,
    pub transcript: f64,
}

impl Default for SearchThresholds {
    fn default() -> Self {
        Self {
            visual: 0.25,
            visual_match: 0.6,
            face: 0.35,
            transcript: 0.35,
        }
    }
}

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 3600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_vector_models() {
        let registry = default_model_registry();
        assert_eq!(registry["clip"].dimension, 512);
        assert_eq!(registry["transcript"].dimension, 384);
        assert_eq!(registry["arcface"].dimension, 512);
        assert_eq!(registry["whisper"].dimension, 0);
    }

    #[test]
    fn indexer_state_round_trips_lowercase() {
        let json = serde_json::to_string(&IndexerState::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
        let back: IndexerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, IndexerState::Paused);
    }
}
