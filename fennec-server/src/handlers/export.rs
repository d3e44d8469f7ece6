use axum::{Json, extract::State};
use serde::Deserialize;

use super::AppState;
use crate::errors::AppResult;

#[derive(Debug, Deserialize)]
pub struct EdlEntry {
    pub scene_id: i64,
    pub in_secs: f64,
    pub out_secs: f64,
}

#[derive(Debug, Deserialize)]
pub struct EdlRequest {
    #[serde(default = "default_title")]
    pub title: String,
    pub entries: Vec<EdlEntry>,
}

fn default_title() -> String {
    "FENNEC EXPORT".to_string()
}

/// `POST /api/export/edl`: emit a timecode edit list for an ordered
/// set of scene intervals. Plain text response.
pub async fn edl(
    State(state): State<AppState>,
    Json(request): Json<EdlRequest>,
) -> AppResult<String> {
    let entries: Vec<(i64, f64, f64)> = request
        .entries
        .iter()
        .map(|e| (e.scene_id, e.in_secs, e.out_secs))
        .collect();
    let edl = state.engine.export_edl(&request.title, &entries).await?;
    Ok(edl)
}
