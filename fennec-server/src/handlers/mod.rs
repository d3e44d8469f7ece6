pub mod admin;
pub mod config;
pub mod export;
pub mod queue;
pub mod scenes;
pub mod stats;

use fennec_core::QueryEngine;
use std::sync::Arc;

/// Shared state for all handlers. The query process owns its own encoder
/// hosts inside the engine; ingest state arrives only through the store.
#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    /// Environment override for watch roots; empty means "use config".
    pub env_watch_roots: Vec<String>,
}

impl AppState {
    /// Watch roots as the ingest process resolves them: environment
    /// first, config otherwise.
    pub async fn watch_roots(&self) -> fennec_core::Result<Vec<String>> {
        if !self.env_watch_roots.is_empty() {
            return Ok(self.env_watch_roots.clone());
        }
        self.engine.store().config().watch_folders().await
    }
}
