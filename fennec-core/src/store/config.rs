use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;

use crate::error::Result;
use crate::settings::{
    self, EnrichmentModels, IndexerState, ModelRegistry, PosterSettings, SearchThresholds, keys,
};

/// Key/value config persisted as JSONB. Typed accessors fall back to the
/// documented defaults when a key has never been set.
#[derive(Clone, Debug)]
pub struct ConfigRepo {
    pool: PgPool,
}

impl ConfigRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT value FROM config_entries WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    pub async fn set_raw(&self, key: &str, value: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO config_entries (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<(String, Value)>> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT key, value FROM config_entries ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn get_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> Result<T> {
        match self.get_raw(key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(fallback),
        }
    }

    async fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_raw(key, &serde_json::to_value(value)?).await
    }

    pub async fn indexer_state(&self) -> Result<IndexerState> {
        self.get_or(keys::INDEXER_STATE, IndexerState::Running).await
    }

    pub async fn set_indexer_state(&self, state: IndexerState) -> Result<()> {
        self.set_typed(keys::INDEXER_STATE, &state).await
    }

    pub async fn poll_interval_seconds(&self) -> Result<u64> {
        self.get_or(
            keys::POLL_INTERVAL_SECONDS,
            settings::DEFAULT_POLL_INTERVAL_SECONDS,
        )
        .await
    }

    /// Watch roots from config; the ingest binary lets the environment
    /// override these.
    pub async fn watch_folders(&self) -> Result<Vec<String>> {
        self.get_or(keys::WATCH_FOLDERS, Vec::new()).await
    }

    pub async fn set_watch_folders(&self, folders: &[String]) -> Result<()> {
        self.set_typed(keys::WATCH_FOLDERS, &folders).await
    }

    pub async fn enrichment_models(&self) -> Result<EnrichmentModels> {
        self.get_or(keys::ENRICHMENT_MODELS, EnrichmentModels::default())
            .await
    }

    pub async fn model_registry(&self) -> Result<ModelRegistry> {
        self.get_or(keys::MODEL_VERSIONS, settings::default_model_registry())
            .await
    }

    pub async fn poster_settings(&self) -> Result<PosterSettings> {
        let defaults = PosterSettings::default();
        Ok(PosterSettings {
            width: self.get_or(keys::POSTER_WIDTH, defaults.width).await?,
            quality: self.get_or(keys::POSTER_QUALITY, defaults.quality).await?,
            format: self.get_or(keys::POSTER_FORMAT, defaults.format).await?,
        })
    }

    pub async fn restart_requested(&self) -> Result<bool> {
        self.get_or(keys::RESTART_REQUESTED, false).await
    }

    pub async fn set_restart_requested(&self, requested: bool) -> Result<()> {
        self.set_typed(keys::RESTART_REQUESTED, &requested).await
    }

    pub async fn search_thresholds(&self) -> Result<SearchThresholds> {
        let defaults = SearchThresholds::default();
        Ok(SearchThresholds {
            visual: self
                .get_or(keys::SEARCH_THRESHOLD_VISUAL, defaults.visual)
                .await?,
            visual_match: self
                .get_or(keys::SEARCH_THRESHOLD_VISUAL_MATCH, defaults.visual_match)
                .await?,
            face: self
                .get_or(keys::SEARCH_THRESHOLD_FACE, defaults.face)
                .await?,
            transcript: self
                .get_or(keys::SEARCH_THRESHOLD_TRANSCRIPT, defaults.transcript)
                .await?,
        })
    }
}
