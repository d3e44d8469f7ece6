use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{FennecError, Result};
use crate::types::file::{NewVideoFile, VideoFile, VideoProbe};

#[derive(Clone, Debug)]
pub struct FileRepo {
    pool: PgPool,
}

impl FileRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, file: &NewVideoFile) -> Result<VideoFile> {
        let row = sqlx::query_as::<_, VideoFile>(
            r#"
            INSERT INTO video_files (
                path, filename, folder, size_bytes, fs_created_at, fs_modified_at,
                duration_secs, width, height, fps, codec, audio_tracks,
                pixel_format, color_space, color_transfer, color_primaries
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&file.path)
        .bind(&file.filename)
        .bind(&file.folder)
        .bind(file.size_bytes)
        .bind(file.fs_created_at)
        .bind(file.fs_modified_at)
        .bind(file.probe.duration_secs)
        .bind(file.probe.width)
        .bind(file.probe.height)
        .bind(file.probe.fps)
        .bind(&file.probe.codec)
        .bind(file.probe.audio_tracks)
        .bind(&file.probe.pixel_format)
        .bind(&file.probe.color_space)
        .bind(&file.probe.color_transfer)
        .bind(&file.probe.color_primaries)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Refresh filesystem + probed metadata after an on-disk change, and
    /// revive the row if it was soft-deleted.
    pub async fn update_metadata(
        &self,
        id: i64,
        size_bytes: i64,
        fs_modified_at: Option<DateTime<Utc>>,
        probe: &VideoProbe,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE video_files SET
                size_bytes = $2,
                fs_modified_at = $3,
                duration_secs = $4,
                width = $5,
                height = $6,
                fps = $7,
                codec = $8,
                audio_tracks = $9,
                pixel_format = $10,
                color_space = $11,
                color_transfer = $12,
                color_primaries = $13,
                indexed_at = NULL,
                deleted_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(size_bytes)
        .bind(fs_modified_at)
        .bind(probe.duration_secs)
        .bind(probe.width)
        .bind(probe.height)
        .bind(probe.fps)
        .bind(&probe.codec)
        .bind(probe.audio_tracks)
        .bind(&probe.pixel_format)
        .bind(&probe.color_space)
        .bind(&probe.color_transfer)
        .bind(&probe.color_primaries)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<VideoFile> {
        sqlx::query_as::<_, VideoFile>("SELECT * FROM video_files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| FennecError::NotFound(format!("file {id}")))
    }

    pub async fn get_by_path(&self, path: &str) -> Result<Option<VideoFile>> {
        let row = sqlx::query_as::<_, VideoFile>("SELECT * FROM video_files WHERE path = $1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list(&self, include_deleted: bool) -> Result<Vec<VideoFile>> {
        let rows = if include_deleted {
            sqlx::query_as::<_, VideoFile>("SELECT * FROM video_files ORDER BY id")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as::<_, VideoFile>(
                "SELECT * FROM video_files WHERE deleted_at IS NULL ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows)
    }

    /// All non-deleted paths, used by the scanner's missing check.
    pub async fn list_active_paths(&self) -> Result<Vec<(i64, String)>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, path FROM video_files WHERE deleted_at IS NULL")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Soft-delete a file whose path disappeared from the watch roots.
    /// Clears any queue entry; scenes and faces stay until purge.
    pub async fn mark_missing(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE video_files SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM enrichment_queue WHERE file_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Append a tag if not already present (e.g. the no-scenes marker).
    pub async fn add_tag(&self, id: i64, tag: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE video_files
            SET tags = array_append(tags, $2)
            WHERE id = $1 AND NOT ($2 = ANY(tags))
            "#,
        )
        .bind(id)
        .bind(tag)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_indexed(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE video_files SET indexed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hard-delete a file row; cascades take scenes, faces, embeddings,
    /// and the queue entry.
    pub async fn purge(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM video_files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
