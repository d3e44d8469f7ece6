use axum::{Json, extract::State};
use fennec_core::types::stats::{LibraryStats, VectorStats, WatchFolderStatus};
use serde::Serialize;

use super::AppState;
use crate::errors::AppResult;

/// `GET /api/stats`
pub async fn library(State(state): State<AppState>) -> AppResult<Json<LibraryStats>> {
    let stats = state.engine.store().stats().library().await?;
    Ok(Json(stats))
}

/// `GET /api/stats/vectors`
pub async fn vectors(State(state): State<AppState>) -> AppResult<Json<VectorStats>> {
    let stats = state.engine.store().stats().vectors().await?;
    Ok(Json(stats))
}

/// `GET /api/watch-folders`
pub async fn watch_folders(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<WatchFolderStatus>>> {
    let roots = state.watch_roots().await?;
    Ok(Json(state.engine.watch_folder_status(&roots).await))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models: fennec_core::models::ModelReadiness,
}

/// `GET /health`: liveness plus query-side model readiness.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models: state.engine.readiness().await,
    })
}
