use thiserror::Error;

#[derive(Error, Debug)]
pub enum FennecError {
    /// On-disk path vanished between discovery and processing.
    #[error("missing file: {0}")]
    MissingFile(String),

    /// The decoder rejected the file; terminal until manual retry.
    #[error("unreadable media: {0}")]
    UnreadableMedia(String),

    /// Transient I/O or decode failure within a pipeline stage.
    #[error("stage error: {0}")]
    StageTransient(String),

    /// A model host has not loaded yet; the job stays pending.
    #[error("model not ready: {0}")]
    ModelNotReady(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("inference transport error: {0}")]
    Inference(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FennecError {
    /// Whether the pipeline should return the job to `pending` instead of
    /// failing it. Environmental failures are not the file's fault.
    pub fn is_environmental(&self) -> bool {
        matches!(self, FennecError::ModelNotReady(_))
    }

    /// Terminal errors are not retried automatically by the next scan.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FennecError::UnreadableMedia(_))
    }
}

pub type Result<T> = std::result::Result<T, FennecError>;
