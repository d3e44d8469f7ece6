use sqlx::{PgPool, QueryBuilder};

use crate::error::{FennecError, Result};
use crate::types::scene::{NewScene, Scene, SceneWithFile};

/// Metadata predicates applied in one SQL pass. All fields optional;
/// `None` means no constraint.
#[derive(Debug, Clone, Default)]
pub struct ScenePredicates {
    pub path_like: Option<String>,
    pub transcript_like: Option<String>,
    pub codec: Option<String>,
    pub fps_min: Option<f64>,
    pub fps_max: Option<f64>,
    pub duration_min: Option<f64>,
    pub duration_max: Option<f64>,
    pub min_width: Option<i32>,
    pub min_height: Option<i32>,
    pub timecode_start: Option<f64>,
    pub timecode_end: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct SceneRepo {
    pool: PgPool,
}

impl SceneRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace a file's scenes with a freshly detected set. Runs in one
    /// transaction so readers never observe a partial cover; cascades
    /// drop the old scenes' faces and embeddings with them.
    pub async fn replace_for_file(&self, file_id: i64, scenes: &[NewScene]) -> Result<Vec<Scene>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM scenes WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = Vec::with_capacity(scenes.len());
        for (index, scene) in scenes.iter().enumerate() {
            let row = sqlx::query_as::<_, Scene>(
                r#"
                INSERT INTO scenes (file_id, scene_index, start_secs, end_secs)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(file_id)
            .bind(index as i32)
            .bind(scene.start_secs)
            .bind(scene.end_secs)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Drop a file's scenes (and, by cascade, their faces and
    /// embeddings) when the file changed on disk.
    pub async fn delete_for_file(&self, file_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM scenes WHERE file_id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_for_file(&self, file_id: i64) -> Result<Vec<Scene>> {
        let rows = sqlx::query_as::<_, Scene>(
            "SELECT * FROM scenes WHERE file_id = $1 ORDER BY scene_index",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> Result<Scene> {
        sqlx::query_as::<_, Scene>("SELECT * FROM scenes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| FennecError::NotFound(format!("scene {id}")))
    }

    pub async fn get_by_index(&self, file_id: i64, scene_index: i32) -> Result<Scene> {
        sqlx::query_as::<_, Scene>(
            "SELECT * FROM scenes WHERE file_id = $1 AND scene_index = $2",
        )
        .bind(file_id)
        .bind(scene_index)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| FennecError::NotFound(format!("scene {file_id}/{scene_index}")))
    }

    pub async fn set_poster(&self, id: i64, poster_path: &str) -> Result<()> {
        sqlx::query("UPDATE scenes SET poster_path = $2 WHERE id = $1")
            .bind(id)
            .bind(poster_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_transcript(&self, id: i64, transcript: &str) -> Result<()> {
        sqlx::query("UPDATE scenes SET transcript = $2 WHERE id = $1")
            .bind(id)
            .bind(transcript)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Paginated browse over scenes of non-deleted files, ordered by
    /// file id then scene index. Returns the page and the total count.
    pub async fn browse(&self, offset: i64, limit: i64) -> Result<(Vec<SceneWithFile>, i64)> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SceneWithFile>(
            r#"
            SELECT s.id, s.file_id, s.scene_index, s.start_secs, s.end_secs,
                   s.poster_path, s.transcript,
                   v.path, v.filename, v.fps
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            ORDER BY s.file_id, s.scene_index
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    /// The browse row shape for an explicit id set, for assembling
    /// search results after intersection.
    pub async fn list_with_file_by_ids(&self, ids: &[i64]) -> Result<Vec<SceneWithFile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, SceneWithFile>(
            r#"
            SELECT s.id, s.file_id, s.scene_index, s.start_secs, s.end_secs,
                   s.poster_path, s.transcript,
                   v.path, v.filename, v.fps
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE s.id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Scene ids of non-deleted files satisfying every given predicate.
    pub async fn filter_ids(&self, predicates: &ScenePredicates) -> Result<Vec<i64>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT s.id
            FROM scenes s
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            "#,
        );

        if let Some(path) = &predicates.path_like {
            builder.push(" AND v.path ILIKE ");
            builder.push_bind(format!("%{path}%"));
        }
        if let Some(text) = &predicates.transcript_like {
            builder.push(" AND s.transcript ILIKE ");
            builder.push_bind(format!("%{text}%"));
        }
        if let Some(codec) = &predicates.codec {
            builder.push(" AND v.codec = ");
            builder.push_bind(codec.clone());
        }
        if let Some(min) = predicates.fps_min {
            builder.push(" AND v.fps >= ");
            builder.push_bind(min);
        }
        if let Some(max) = predicates.fps_max {
            builder.push(" AND v.fps <= ");
            builder.push_bind(max);
        }
        if let Some(min) = predicates.duration_min {
            builder.push(" AND v.duration_secs >= ");
            builder.push_bind(min);
        }
        if let Some(max) = predicates.duration_max {
            builder.push(" AND v.duration_secs <= ");
            builder.push_bind(max);
        }
        if let Some(width) = predicates.min_width {
            builder.push(" AND v.width >= ");
            builder.push_bind(width);
        }
        if let Some(height) = predicates.min_height {
            builder.push(" AND v.height >= ");
            builder.push_bind(height);
        }
        // Interval overlap with [start, end).
        if let Some(start) = predicates.timecode_start {
            builder.push(" AND s.end_secs > ");
            builder.push_bind(start);
        }
        if let Some(end) = predicates.timecode_end {
            builder.push(" AND s.start_secs < ");
            builder.push_bind(end);
        }

        let rows: Vec<(i64,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn set_face_scanned(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE scenes SET face_scanned_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite cluster assignments for one clustering run.
    pub async fn update_clusters(&self, assignments: &[(i64, i32, f64)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (scene_id, cluster_id, order) in assignments {
            sqlx::query("UPDATE scenes SET cluster_id = $2, cluster_order = $3 WHERE id = $1")
                .bind(scene_id)
                .bind(cluster_id)
                .bind(order)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
