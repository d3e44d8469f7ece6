use sqlx::PgPool;

use crate::error::Result;
use crate::types::stats::{LibraryStats, ModelCoverage, VectorStats};

#[derive(Clone, Debug)]
pub struct StatsRepo {
    pool: PgPool,
}

impl StatsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn library(&self) -> Result<LibraryStats> {
        let (files, total_duration_secs): (i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), SUM(duration_secs)
            FROM video_files
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (scenes,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (faces,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM faces f
            JOIN scenes s ON s.id = f.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(LibraryStats {
            files,
            scenes,
            faces,
            total_duration_secs: total_duration_secs.unwrap_or(0.0),
        })
    }

    /// Per-model coverage. For models whose input is conditionally
    /// present (transcript, faces), "scanned but produced none" is
    /// reported separately from "not yet scanned".
    pub async fn vectors(&self) -> Result<VectorStats> {
        let (scenes,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let coverage_of = |found: i64| {
            if scenes == 0 {
                0.0
            } else {
                (found as f64 / scenes as f64) * 100.0
            }
        };

        let (clip_found,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM scene_embeddings e
            JOIN scenes s ON s.id = e.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE e.model_name = 'clip' AND v.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (transcript_found,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM scene_embeddings e
            JOIN scenes s ON s.id = e.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE e.model_name = 'transcript' AND v.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        // Scanned, but the scene had no speech.
        let (transcript_none,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL AND s.transcript = ''
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        // Scenes with at least one detected face.
        let (face_found,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT f.scene_id)
            FROM faces f
            JOIN scenes s ON s.id = f.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        // Scanned posters where the detector found nothing.
        let (face_none,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
              AND s.face_scanned_at IS NOT NULL
              AND NOT EXISTS (SELECT 1 FROM faces f WHERE f.scene_id = s.id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(VectorStats {
            scenes,
            models: vec![
                ModelCoverage {
                    name: "clip".to_string(),
                    found: clip_found,
                    scanned_none: 0,
                    coverage: coverage_of(clip_found),
                },
                ModelCoverage {
                    name: "transcript".to_string(),
                    found: transcript_found,
                    scanned_none: transcript_none,
                    coverage: coverage_of(transcript_found),
                },
                ModelCoverage {
                    name: "arcface".to_string(),
                    found: face_found,
                    scanned_none: face_none,
                    coverage: coverage_of(face_found),
                },
            ],
        })
    }
}
