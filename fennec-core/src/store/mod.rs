//! Durable state. All components touch files, scenes, faces, embeddings,
//! the queue, and config through this facade; nothing else owns a pool.

pub mod admin;
pub mod config;
pub mod embeddings;
pub mod faces;
pub mod files;
pub mod queue;
pub mod scenes;
pub mod stats;

pub use admin::AdminRepo;
pub use config::ConfigRepo;
pub use embeddings::{EmbeddingRepo, SceneMatch};
pub use faces::{FaceMatch, FaceRepo};
pub use files::FileRepo;
pub use queue::QueueRepo;
pub use scenes::{SceneRepo, ScenePredicates};
pub use stats::StatsRepo;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::error::Result;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
    files: FileRepo,
    scenes: SceneRepo,
    faces: FaceRepo,
    embeddings: EmbeddingRepo,
    queue: QueueRepo,
    config: ConfigRepo,
    admin: AdminRepo,
    stats: StatsRepo,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(num_cpus::get() as u32);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        info!(max_connections, "database pool initialized");

        Ok(Self::from_pool(pool))
    }

    /// Build a store over an existing pool (integration tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            files: FileRepo::new(pool.clone()),
            scenes: SceneRepo::new(pool.clone()),
            faces: FaceRepo::new(pool.clone()),
            embeddings: EmbeddingRepo::new(pool.clone()),
            queue: QueueRepo::new(pool.clone()),
            config: ConfigRepo::new(pool.clone()),
            admin: AdminRepo::new(pool.clone()),
            stats: StatsRepo::new(pool.clone()),
            pool,
        }
    }

    /// Run embedded migrations, creating the pgvector extension.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn files(&self) -> &FileRepo {
        &self.files
    }

    pub fn scenes(&self) -> &SceneRepo {
        &self.scenes
    }

    pub fn faces(&self) -> &FaceRepo {
        &self.faces
    }

    pub fn embeddings(&self) -> &EmbeddingRepo {
        &self.embeddings
    }

    pub fn queue(&self) -> &QueueRepo {
        &self.queue
    }

    pub fn config(&self) -> &ConfigRepo {
        &self.config
    }

    pub fn admin(&self) -> &AdminRepo {
        &self.admin
    }

    pub fn stats(&self) -> &StatsRepo {
        &self.stats
    }
}
