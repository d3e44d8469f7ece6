use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;
use std::collections::BTreeMap;

use super::AppState;
use crate::errors::{AppError, AppResult};

/// `GET /api/config`: every persisted entry.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<BTreeMap<String, Value>>> {
    let entries = state.engine.store().config().list().await?;
    Ok(Json(entries.into_iter().collect()))
}

/// `GET /api/config/{key}`
pub async fn get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<Value>> {
    let value = state
        .engine
        .store()
        .config()
        .get_raw(&key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("config key '{key}'")))?;
    Ok(Json(value))
}

/// `PUT /api/config/{key}`: set persists immediately; the ingest loop
/// picks changes up at its next boundary.
pub async fn set(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> AppResult<Json<Value>> {
    validate(&key, &value)?;
    state.engine.store().config().set_raw(&key, &value).await?;
    Ok(Json(value))
}

/// Reject obviously ill-typed writes for the known keys; unknown keys
/// pass through untyped.
fn validate(key: &str, value: &Value) -> Result<(), AppError> {
    use fennec_core::settings::keys;

    let ok = match key {
        keys::INDEXER_STATE => matches!(value.as_str(), Some("running") | Some("paused")),
        keys::POLL_INTERVAL_SECONDS => value.as_u64().is_some(),
        keys::WATCH_FOLDERS => value
            .as_array()
            .is_some_and(|a| a.iter().all(|v| v.as_str().is_some_and(|s| s.starts_with('/')))),
        keys::POSTER_WIDTH => value.as_u64().is_some_and(|w| w > 0),
        keys::POSTER_QUALITY => value.as_u64().is_some_and(|q| (1..=100).contains(&q)),
        keys::SEARCH_THRESHOLD_VISUAL
        | keys::SEARCH_THRESHOLD_VISUAL_MATCH
        | keys::SEARCH_THRESHOLD_FACE
        | keys::SEARCH_THRESHOLD_TRANSCRIPT => value
            .as_f64()
            .is_some_and(|t| (0.0..=1.0).contains(&t)),
        _ => true,
    };

    if ok {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("invalid value for '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indexer_state_accepts_only_known_states() {
        assert!(validate("indexer_state", &json!("running")).is_ok());
        assert!(validate("indexer_state", &json!("paused")).is_ok());
        assert!(validate("indexer_state", &json!("sprinting")).is_err());
        assert!(validate("indexer_state", &json!(1)).is_err());
    }

    #[test]
    fn thresholds_must_be_unit_interval() {
        assert!(validate("search_threshold_visual", &json!(0.5)).is_ok());
        assert!(validate("search_threshold_visual", &json!(1.5)).is_err());
        assert!(validate("search_threshold_face", &json!(-0.1)).is_err());
    }

    #[test]
    fn watch_folders_must_be_absolute() {
        assert!(validate("watch_folders", &json!(["/media/a", "/media/b"])).is_ok());
        assert!(validate("watch_folders", &json!(["relative/path"])).is_err());
        assert!(validate("watch_folders", &json!("not-a-list")).is_err());
    }

    #[test]
    fn poster_quality_bounds() {
        assert!(validate("poster_quality", &json!(80)).is_ok());
        assert!(validate("poster_quality", &json!(0)).is_err());
        assert!(validate("poster_quality", &json!(101)).is_err());
    }

    #[test]
    fn unknown_keys_pass_through() {
        assert!(validate("custom_key", &json!({"anything": true})).is_ok());
    }
}
