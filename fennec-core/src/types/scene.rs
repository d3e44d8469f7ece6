use pgvector::Vector;
use serde::{Deserialize, Serialize};

/// A soft cut within a file. Scenes form a strictly ordered
/// non-overlapping cover of `[0, duration)`; `end_secs` is exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Scene {
    pub id: i64,
    pub file_id: i64,
    pub scene_index: i32,
    pub start_secs: f64,
    pub end_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// When the face stage last examined this scene's poster; set even
    /// when no faces were found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_scanned_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_order: Option<f64>,
}

/// Interval produced by the scene detector, before rows exist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScene {
    pub start_secs: f64,
    pub end_secs: f64,
}

/// A detected face within a scene's poster frame. Bounding box is in
/// source-image pixels.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Face {
    pub id: i64,
    pub scene_id: i64,
    pub bbox_x: i32,
    pub bbox_y: i32,
    pub bbox_w: i32,
    pub bbox_h: i32,
    #[serde(skip_serializing)]
    pub embedding: Vector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_order: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewFace {
    pub bbox_x: i32,
    pub bbox_y: i32,
    pub bbox_w: i32,
    pub bbox_h: i32,
    pub embedding: Vec<f32>,
}

/// A model-tagged vector attached to a scene. At most one row per
/// (scene, model); a later version overwrites the earlier.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SceneEmbedding {
    pub id: i64,
    pub scene_id: i64,
    pub model_name: String,
    pub model_version: String,
    pub dim: i32,
    pub embedding: Vector,
}

/// A scene joined with its file's display context, the unit the browse
/// and search surfaces return.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SceneWithFile {
    pub id: i64,
    pub file_id: i64,
    pub scene_index: i32,
    pub start_secs: f64,
    pub end_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub path: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

/// Per-model presence summary for the scene-detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSummary {
    pub model_name: String,
    pub model_version: String,
    pub dim: i32,
}

/// Full scene with its file context, embedding summaries, and faces.
#[derive(Debug, Clone, Serialize)]
pub struct SceneDetail {
    #[serde(flatten)]
    pub scene: Scene,
    pub file_path: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    pub embeddings: Vec<EmbeddingSummary>,
    pub faces: Vec<Face>,
}
