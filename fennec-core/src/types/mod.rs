pub mod file;
pub mod filters;
pub mod progress;
pub mod queue;
pub mod scene;
pub mod stats;

pub use file::{NewVideoFile, VideoFile, VideoProbe};
pub use filters::{SearchFilter, SearchRequest, SearchResponse, SceneHit};
pub use progress::{ScanPhase, ScanProgress, ScanProgressTracker, ScanSummary};
pub use queue::{QueueItem, QueueSnapshot, QueueStatus};
pub use scene::{
    EmbeddingSummary, Face, NewFace, NewScene, Scene, SceneDetail, SceneEmbedding, SceneWithFile,
};
pub use stats::{LibraryStats, ModelCoverage, VectorStats, WatchFolderStatus};
