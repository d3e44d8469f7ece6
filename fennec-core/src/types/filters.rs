use serde::{Deserialize, Serialize};

use super::scene::Face;

/// One clause of a combined search. Clauses intersect on scene id;
/// similarity clauses carry their own admission threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchFilter {
    /// Encode the query text with the visual encoder and match scene
    /// "clip" vectors.
    VisualText {
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
    /// Case-insensitive substring match against scene transcripts.
    DialogKeyword { query: String },
    /// Encode the query with the sentence encoder and match scene
    /// "transcript" vectors. Falls back to keyword search when the
    /// sentence host is not loaded.
    DialogSemantic {
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
    /// Match faces similar to a known face, projected back to scenes.
    /// `face_id` is preferred; `(scene_id, face_index)` is the
    /// human-facing fallback.
    Face {
        #[serde(skip_serializing_if = "Option::is_none")]
        face_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scene_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        face_index: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
    /// Scenes visually similar to a reference scene, excluding it.
    VisualMatch {
        scene_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
    /// Path substring (case-insensitive).
    Path { query: String },
    /// Exact codec name.
    Codec { codec: String },
    FpsRange {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    DurationRange {
        #[serde(skip_serializing_if = "Option::is_none")]
        min_secs: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_secs: Option<f64>,
    },
    ResolutionMin {
        #[serde(skip_serializing_if = "Option::is_none")]
        min_width: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_height: Option<i32>,
    },
    /// Scene interval overlap with `[start, end)` in seconds.
    TimecodeRange {
        #[serde(skip_serializing_if = "Option::is_none")]
        start_secs: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_secs: Option<f64>,
    },
}

impl SearchFilter {
    /// Similarity clauses define the result ordering; the first one wins.
    pub fn is_similarity(&self) -> bool {
        matches!(
            self,
            SearchFilter::VisualText { .. }
                | SearchFilter::DialogSemantic { .. }
                | SearchFilter::Face { .. }
                | SearchFilter::VisualMatch { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub filters: Vec<SearchFilter>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// A scene admitted by the search, with display context and, when a
/// similarity clause ordered the results, its score.
#[derive(Debug, Clone, Serialize)]
pub struct SceneHit {
    pub scene_id: i64,
    pub file_id: i64,
    pub path: String,
    pub filename: String,
    pub scene_index: i32,
    pub start_secs: f64,
    pub end_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub faces: Vec<Face>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub scenes: Vec<SceneHit>,
    pub total: i64,
    /// Set when a semantic dialog clause degraded to keyword matching
    /// because the sentence encoder was not loaded.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub keyword_fallback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_json_shape_is_tagged() {
        let filter = SearchFilter::VisualText {
            query: "sunset over water".into(),
            threshold: Some(0.3),
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["kind"], "visual_text");
        assert_eq!(json["query"], "sunset over water");
    }

    #[test]
    fn similarity_classification() {
        assert!(
            SearchFilter::VisualMatch {
                scene_id: 1,
                threshold: None
            }
            .is_similarity()
        );
        assert!(
            !SearchFilter::Codec {
                codec: "h264".into()
            }
            .is_similarity()
        );
    }
}
