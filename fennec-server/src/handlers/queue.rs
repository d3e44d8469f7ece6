use axum::{Json, extract::State};
use fennec_core::types::progress::ScanProgress;
use fennec_core::types::queue::QueueSnapshot;

use super::AppState;
use crate::errors::AppResult;

/// `GET /api/queue`: per-status counts and the in-flight job.
pub async fn snapshot(State(state): State<AppState>) -> AppResult<Json<QueueSnapshot>> {
    let snapshot = state.engine.store().queue().snapshot().await?;
    Ok(Json(snapshot))
}

/// `GET /api/scan/status`: the ingest process's latest published scan
/// progress. Idle when nothing was ever published.
pub async fn scan_status(State(state): State<AppState>) -> AppResult<Json<ScanProgress>> {
    let progress = match state
        .engine
        .store()
        .config()
        .get_raw(fennec_core::settings::keys::SCAN_STATUS)
        .await?
    {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| crate::errors::AppError::internal(format!("bad scan status: {e}")))?,
        None => ScanProgress {
            phase: fennec_core::types::progress::ScanPhase::Idle,
            current_folder: None,
            directories_scanned: 0,
            files_found: 0,
            files_processed: 0,
            files_new: 0,
            files_updated: 0,
            files_skipped: 0,
        },
    };
    Ok(Json(progress))
}
