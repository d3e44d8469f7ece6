use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub status: &'static str,
    pub affected: u64,
}

fn ok(affected: u64) -> Json<AdminResponse> {
    Json(AdminResponse {
        status: "ok",
        affected,
    })
}

/// `POST /api/admin/reset-failed`: failed jobs back to pending.
pub async fn reset_failed(State(state): State<AppState>) -> AppResult<Json<AdminResponse>> {
    let affected = state.engine.store().queue().reset_failed().await?;
    info!(affected, "reset failed queue items");
    Ok(ok(affected))
}

/// `POST /api/admin/reset-processing`: manual crash recovery.
pub async fn reset_processing(State(state): State<AppState>) -> AppResult<Json<AdminResponse>> {
    let affected = state.engine.store().queue().reset_processing().await?;
    info!(affected, "reset processing queue items");
    Ok(ok(affected))
}

/// `POST /api/admin/purge-deleted`: hard-delete soft-deleted files.
pub async fn purge_deleted(State(state): State<AppState>) -> AppResult<Json<AdminResponse>> {
    let affected = state.engine.store().admin().purge_deleted().await?;
    info!(affected, "purged soft-deleted files");
    Ok(ok(affected))
}

/// `POST /api/admin/purge-orphans`: drop rows outside the current
/// watch roots.
pub async fn purge_orphans(State(state): State<AppState>) -> AppResult<Json<AdminResponse>> {
    let roots = state.watch_roots().await?;
    if roots.is_empty() {
        return Err(AppError::bad_request(
            "refusing to purge orphans with no watch roots configured",
        ));
    }
    let affected = state.engine.store().admin().purge_orphans(&roots).await?;
    info!(affected, "purged orphaned files");
    Ok(ok(affected))
}

/// `POST /api/admin/restart`: ask the ingest process to exit at its
/// next boundary so a supervisor restart re-examines remounted roots.
pub async fn restart_ingest(State(state): State<AppState>) -> AppResult<Json<AdminResponse>> {
    state
        .engine
        .store()
        .config()
        .set_restart_requested(true)
        .await?;
    info!("ingest restart requested");
    Ok(ok(0))
}

#[derive(Debug, Deserialize)]
pub struct WipeRequest {
    #[serde(default)]
    pub confirm: bool,
}

/// `POST /api/admin/wipe`: delete all enrichment data. Config survives.
/// Gated on explicit confirmation in the request body.
pub async fn wipe(
    State(state): State<AppState>,
    Json(request): Json<WipeRequest>,
) -> AppResult<Json<AdminResponse>> {
    if !request.confirm {
        return Err(AppError::bad_request("wipe requires {\"confirm\": true}"));
    }
    warn!("wiping all enrichment data");
    state.engine.store().admin().wipe().await?;
    Ok(ok(0))
}
