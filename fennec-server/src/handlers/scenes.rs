use axum::{
    Json,
    extract::{Path, Query, State},
};
use fennec_core::types::filters::{SearchRequest, SearchResponse};
use fennec_core::types::scene::SceneDetail;
use serde::Deserialize;

use super::AppState;
use crate::errors::AppResult;

#[derive(Debug, Deserialize)]
pub struct BrowseParams {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// `GET /api/scenes`: paginated browse ordered by file and scene index.
pub async fn browse(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> AppResult<Json<SearchResponse>> {
    let response = state.engine.browse(params.offset, params.limit).await?;
    Ok(Json(response))
}

/// `POST /api/search`: combined-filter search.
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> AppResult<Json<SearchResponse>> {
    let response = state.engine.search(&request).await?;
    Ok(Json(response))
}

/// `GET /api/scenes/{id}`: full scene with embeddings summary and faces.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<SceneDetail>> {
    let detail = state.engine.scene_detail(id).await?;
    Ok(Json(detail))
}
