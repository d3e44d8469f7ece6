//! The enrichment stage machine. One claimed job at a time steps through
//! the enabled stages in fixed order; each stage commits its artifacts
//! independently so a crash leaves earlier stages durable and a retry
//! re-enters at the first incomplete stage.

mod stages;

pub use stages::{Stage, enabled_stages};

use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{FennecError, Result};
use crate::media::{audio, frames, probe, scene_detect};
use crate::models::ModelHosts;
use crate::settings::{IndexerState, ModelRegistry, PosterSettings};
use crate::store::Store;
use crate::types::file::VideoFile;
use crate::types::queue::QueueItem;
use crate::types::scene::{NewFace, Scene};

/// Tag recorded on a file whose detector produced an empty cover, so the
/// completed state stays distinguishable from "no scenes yet".
pub const NO_SCENES_TAG: &str = "no_scenes_detected";

/// Outcome of one drain step, driving the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No pending work.
    Idle,
    /// A job ran to completion.
    Completed,
    /// A job failed and was recorded as such.
    Failed,
    /// A model host is unavailable; the job went back to pending and the
    /// worker loop should back off.
    Backoff,
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    store: Store,
    hosts: ModelHosts,
    data_dir: PathBuf,
}

impl Pipeline {
    pub fn new(store: Store, hosts: ModelHosts, data_dir: PathBuf) -> Self {
        Self {
            store,
            hosts,
            data_dir,
        }
    }

    fn poster_path(&self, scene_id: i64, format: &str) -> PathBuf {
        let ext = if format == "png" { "png" } else { "jpg" };
        self.data_dir.join("posters").join(format!("{scene_id}.{ext}"))
    }

    /// Claim and run the oldest pending job, if any.
    pub async fn process_next(&self) -> Result<DrainOutcome> {
        let Some(job) = self.store.queue().claim_one().await? else {
            return Ok(DrainOutcome::Idle);
        };

        let file = match self.store.files().get(job.file_id).await {
            Ok(file) => file,
            Err(e) => {
                // The file vanished under the queue entry.
                self.store
                    .queue()
                    .fail(job.id, &format!("missing file row: {e}"))
                    .await?;
                return Ok(DrainOutcome::Failed);
            }
        };

        let models = self.store.config().enrichment_models().await?;
        let registry = self.store.config().model_registry().await?;
        let posters = self.store.config().poster_settings().await?;
        let stages = enabled_stages(&models);
        let total = stages.len() as i32;

        info!(
            file = %file.path,
            stages = total,
            retry = job.retry_count,
            "processing enrichment job {}",
            job.id
        );

        for (index, stage) in stages.iter().enumerate() {
            self.wait_if_paused().await?;

            self.store
                .queue()
                .set_stage(job.id, stage.name(), index as i32 + 1, total)
                .await?;

            if let Err(e) = self
                .run_stage(*stage, &file, &registry, &posters)
                .await
            {
                return self.handle_stage_error(&job, *stage, e).await;
            }
        }

        self.store.queue().complete(job.id).await?;
        self.store.files().set_indexed(file.id).await?;
        info!(file = %file.path, "enrichment complete");
        Ok(DrainOutcome::Completed)
    }

    async fn handle_stage_error(
        &self,
        job: &QueueItem,
        stage: Stage,
        e: FennecError,
    ) -> Result<DrainOutcome> {
        if e.is_environmental() {
            warn!("{} stage deferred, host unavailable: {e}", stage.name());
            self.store.queue().release(job.id).await?;
            return Ok(DrainOutcome::Backoff);
        }

        let message = format!("{}: {e}", stage.name());
        error!("job {} failed at {message}", job.id);
        self.store.queue().fail(job.id, &message).await?;
        Ok(DrainOutcome::Failed)
    }

    /// Hold at the stage boundary while the indexer is paused.
    async fn wait_if_paused(&self) -> Result<()> {
        loop {
            match self.store.config().indexer_state().await? {
                IndexerState::Running => return Ok(()),
                IndexerState::Paused => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        file: &VideoFile,
        registry: &ModelRegistry,
        posters: &PosterSettings,
    ) -> Result<()> {
        match stage {
            Stage::Metadata => self.stage_metadata(file).await,
            Stage::SceneDetection => self.stage_scene_detection(file).await,
            Stage::PosterExtraction => self.stage_posters(file, posters).await,
            Stage::VisualEmbedding => self.stage_visual(file, registry).await,
            Stage::Transcription => self.stage_transcription(file).await,
            Stage::TranscriptEmbedding => self.stage_transcript_embedding(file, registry).await,
            Stage::FaceDetection => self.stage_faces(file).await,
        }
    }

    /// Stage 1: confirm the file is still readable and refresh metadata
    /// that drifted since insert.
    async fn stage_metadata(&self, file: &VideoFile) -> Result<()> {
        let path = PathBuf::from(&file.path);
        if !path.exists() {
            return Err(FennecError::MissingFile(file.path.clone()));
        }

        let meta = tokio::fs::metadata(&path).await?;
        let probed = run_blocking({
            let path = path.clone();
            move || probe::probe_file(&path)
        })
        .await?;

        let mtime = meta
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t));
        self.store
            .files()
            .update_metadata(file.id, meta.len() as i64, mtime, &probed)
            .await?;
        Ok(())
    }

    /// Stage 2: content-based scene detection. Skipped when a cover
    /// already exists (crash retry); otherwise replaces atomically.
    async fn stage_scene_detection(&self, file: &VideoFile) -> Result<()> {
        let existing = self.store.scenes().list_for_file(file.id).await?;
        if !existing.is_empty() {
            return Ok(());
        }

        // Metadata stage just refreshed the row; re-read for duration.
        let fresh = self.store.files().get(file.id).await?;
        let duration = fresh.duration_secs.ok_or_else(|| {
            FennecError::UnreadableMedia(format!("{}: unknown duration", file.path))
        })?;

        let path = PathBuf::from(&file.path);
        let scenes = run_blocking(move || scene_detect::detect_scenes(&path, duration)).await?;

        if scenes.is_empty() {
            warn!(file = %file.path, "detector produced no scenes");
            self.store.files().add_tag(file.id, NO_SCENES_TAG).await?;
            return Ok(());
        }

        self.store.scenes().replace_for_file(file.id, &scenes).await?;
        Ok(())
    }

    /// Stage 3: one poster per scene at the interval midpoint.
    async fn stage_posters(&self, file: &VideoFile, settings: &PosterSettings) -> Result<()> {
        let scenes = self.store.scenes().list_for_file(file.id).await?;
        for scene in scenes {
            let out_path = self.poster_path(scene.id, &settings.format);
            if scene.poster_path.is_some() && out_path.exists() {
                continue;
            }

            let midpoint = (scene.start_secs + scene.end_secs) / 2.0;
            let source = PathBuf::from(&file.path);
            let settings = settings.clone();
            let out = out_path.clone();
            run_blocking(move || {
                let frame = frames::decode_frame_at(&source, midpoint)?;
                frames::write_poster(&frame, &out, &settings)?;
                Ok(())
            })
            .await?;

            self.store
                .scenes()
                .set_poster(scene.id, &out_path.to_string_lossy())
                .await?;
        }
        Ok(())
    }

    /// Stage 4: visual embedding of each poster, keyed on (scene, clip).
    async fn stage_visual(&self, file: &VideoFile, registry: &ModelRegistry) -> Result<()> {
        let Some(spec) = registry.get("clip") else {
            return Ok(());
        };

        let scenes = self.store.scenes().list_for_file(file.id).await?;
        for scene in scenes {
            if self.embedding_current(scene.id, "clip", &spec.version).await? {
                continue;
            }
            let Some(poster) = scene.poster_path.as_deref() else {
                continue;
            };

            let bytes = tokio::fs::read(poster).await?;
            let vector = self.hosts.visual.embed_image(&bytes).await?;
            self.store
                .embeddings()
                .upsert(scene.id, "clip", &spec.version, &vector)
                .await?;
        }
        Ok(())
    }

    /// Stage 5: speech-to-text per scene. A silent or audio-less scene
    /// records an empty transcript so the stage reads as scanned.
    async fn stage_transcription(&self, file: &VideoFile) -> Result<()> {
        let scenes = self.store.scenes().list_for_file(file.id).await?;
        for scene in scenes {
            if scene.transcript.is_some() {
                continue;
            }

            let source = PathBuf::from(&file.path);
            let (start, end) = (scene.start_secs, scene.end_secs);
            let wav =
                run_blocking(move || audio::extract_audio_range(&source, start, end)).await?;

            let text = match wav {
                Some(wav) if wav.len() > 44 => self.hosts.speech.transcribe(&wav).await?,
                _ => String::new(),
            };
            self.store
                .scenes()
                .set_transcript(scene.id, text.trim())
                .await?;
        }
        Ok(())
    }

    /// Stage 6: sentence embedding over non-empty transcripts.
    async fn stage_transcript_embedding(
        &self,
        file: &VideoFile,
        registry: &ModelRegistry,
    ) -> Result<()> {
        let Some(spec) = registry.get("transcript") else {
            return Ok(());
        };

        let scenes = self.store.scenes().list_for_file(file.id).await?;
        for scene in scenes {
            let Some(transcript) = scene.transcript.as_deref() else {
                continue;
            };
            if transcript.is_empty() {
                continue;
            }
            if self
                .embedding_current(scene.id, "transcript", &spec.version)
                .await?
            {
                continue;
            }

            let vector = self.hosts.sentence.embed(transcript).await?;
            self.store
                .embeddings()
                .upsert(scene.id, "transcript", &spec.version, &vector)
                .await?;
        }
        Ok(())
    }

    /// Stage 7: face detection on each poster. A retry deletes the
    /// scene's faces before re-inserting, so rows exist exactly once per
    /// detection run.
    async fn stage_faces(&self, file: &VideoFile) -> Result<()> {
        let scenes = self.store.scenes().list_for_file(file.id).await?;
        for scene in scenes {
            if scene.face_scanned_at.is_some() {
                continue;
            }
            let Some(poster) = scene.poster_path.as_deref() else {
                continue;
            };

            let bytes = tokio::fs::read(poster).await?;
            let detected = self.hosts.face.detect(&bytes).await?;

            let faces: Vec<NewFace> = detected
                .into_iter()
                .map(|face| NewFace {
                    bbox_x: face.bbox.0,
                    bbox_y: face.bbox.1,
                    bbox_w: face.bbox.2,
                    bbox_h: face.bbox.3,
                    embedding: face.embedding,
                })
                .collect();

            self.store.faces().replace_for_scene(scene.id, &faces).await?;
            self.store.scenes().set_face_scanned(scene.id).await?;
        }
        Ok(())
    }

    /// Whether (scene, model) already carries a vector for the registry
    /// version; matching versions are skipped on re-enrichment.
    async fn embedding_current(
        &self,
        scene_id: i64,
        model: &str,
        version: &str,
    ) -> Result<bool> {
        Ok(self
            .store
            .embeddings()
            .stored_version(scene_id, model)
            .await?
            .is_some_and(|stored| stored == version))
    }
}

/// Run blocking media work off the async executor, containing panics
/// from corrupt files.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(work)).unwrap_or_else(|_| {
            Err(FennecError::StageTransient(
                "decoder panicked, media is likely corrupt".to_string(),
            ))
        })
    })
    .await
    .map_err(|e| FennecError::Internal(format!("blocking task join failed: {e}")))?
}

/// Verify a completed file's scenes form a strictly ordered
/// non-overlapping cover of `[0, duration)` with dense indexes.
pub fn verify_scene_cover(scenes: &[Scene], duration_secs: f64) -> bool {
    if scenes.is_empty() {
        return false;
    }
    let mut cursor = 0.0f64;
    for (i, scene) in scenes.iter().enumerate() {
        if scene.scene_index != i as i32 {
            return false;
        }
        if scene.start_secs != cursor || scene.end_secs <= scene.start_secs {
            return false;
        }
        cursor = scene.end_secs;
    }
    (cursor - duration_secs).abs() < 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: i64, index: i32, start: f64, end: f64) -> Scene {
        Scene {
            id,
            file_id: 1,
            scene_index: index,
            start_secs: start,
            end_secs: end,
            poster_path: None,
            transcript: None,
            face_scanned_at: None,
            cluster_id: None,
            cluster_order: None,
        }
    }

    #[test]
    fn cover_accepts_contiguous_scenes() {
        let scenes = vec![
            scene(1, 0, 0.0, 5.0),
            scene(2, 1, 5.0, 12.5),
            scene(3, 2, 12.5, 60.0),
        ];
        assert!(verify_scene_cover(&scenes, 60.0));
    }

    #[test]
    fn cover_rejects_gaps_overlaps_and_bad_indexes() {
        let gap = vec![scene(1, 0, 0.0, 5.0), scene(2, 1, 6.0, 10.0)];
        assert!(!verify_scene_cover(&gap, 10.0));

        let overlap = vec![scene(1, 0, 0.0, 5.0), scene(2, 1, 4.0, 10.0)];
        assert!(!verify_scene_cover(&overlap, 10.0));

        let bad_index = vec![scene(1, 0, 0.0, 5.0), scene(2, 2, 5.0, 10.0)];
        assert!(!verify_scene_cover(&bad_index, 10.0));

        let short = vec![scene(1, 0, 0.0, 5.0)];
        assert!(!verify_scene_cover(&short, 10.0));
    }

    #[test]
    fn cover_rejects_empty() {
        assert!(!verify_scene_cover(&[], 10.0));
    }
}
