use pgvector::Vector;
use sqlx::PgPool;

use crate::error::{FennecError, Result};
use crate::types::scene::{Face, NewFace};

/// A face admitted by a similarity query, joined to its parent scene.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FaceMatch {
    pub face_id: i64,
    pub scene_id: i64,
    pub similarity: f64,
}

#[derive(Clone, Debug)]
pub struct FaceRepo {
    pool: PgPool,
}

impl FaceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace a scene's faces from one detection run. Transactional so a
    /// retry never doubles rows.
    pub async fn replace_for_scene(&self, scene_id: i64, faces: &[NewFace]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM faces WHERE scene_id = $1")
            .bind(scene_id)
            .execute(&mut *tx)
            .await?;

        for face in faces {
            sqlx::query(
                r#"
                INSERT INTO faces (scene_id, bbox_x, bbox_y, bbox_w, bbox_h, embedding)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(scene_id)
            .bind(face.bbox_x)
            .bind(face.bbox_y)
            .bind(face.bbox_w)
            .bind(face.bbox_h)
            .bind(Vector::from(face.embedding.clone()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Face> {
        sqlx::query_as::<_, Face>("SELECT * FROM faces WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| FennecError::NotFound(format!("face {id}")))
    }

    pub async fn list_for_scene(&self, scene_id: i64) -> Result<Vec<Face>> {
        let rows = sqlx::query_as::<_, Face>(
            "SELECT * FROM faces WHERE scene_id = $1 ORDER BY id",
        )
        .bind(scene_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Faces for a batch of scenes, for assembling browse/search rows.
    pub async fn list_for_scenes(&self, scene_ids: &[i64]) -> Result<Vec<Face>> {
        if scene_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Face>(
            "SELECT * FROM faces WHERE scene_id = ANY($1) ORDER BY scene_id, id",
        )
        .bind(scene_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_for_cluster(&self, cluster_id: i32) -> Result<Vec<Face>> {
        let rows = sqlx::query_as::<_, Face>(
            "SELECT * FROM faces WHERE cluster_id = $1 ORDER BY cluster_order NULLS LAST, id",
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All face vectors, for the clustering pass. Soft-deleted files are
    /// excluded through their scenes.
    pub async fn list_all_vectors(&self) -> Result<Vec<(i64, Vector)>> {
        let rows: Vec<(i64, Vector)> = sqlx::query_as(
            r#"
            SELECT f.id, f.embedding
            FROM faces f
            JOIN scenes s ON s.id = f.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
            ORDER BY f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Cosine nearest neighbours over face vectors, excluding the query
    /// face itself and soft-deleted files.
    pub async fn nearest(
        &self,
        query: &[f32],
        exclude_face_id: Option<i64>,
        min_similarity: f64,
        limit: i64,
    ) -> Result<Vec<FaceMatch>> {
        let rows = sqlx::query_as::<_, FaceMatch>(
            r#"
            SELECT f.id AS face_id,
                   f.scene_id,
                   1 - (f.embedding <=> $1) AS similarity
            FROM faces f
            JOIN scenes s ON s.id = f.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE v.deleted_at IS NULL
              AND ($2::BIGINT IS NULL OR f.id <> $2)
              AND 1 - (f.embedding <=> $1) >= $3
            ORDER BY f.embedding <=> $1
            LIMIT $4
            "#,
        )
        .bind(Vector::from(query.to_vec()))
        .bind(exclude_face_id)
        .bind(min_similarity)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_clusters(&self, assignments: &[(i64, i32, f64)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (face_id, cluster_id, order) in assignments {
            sqlx::query("UPDATE faces SET cluster_id = $2, cluster_order = $3 WHERE id = $1")
                .bind(face_id)
                .bind(cluster_id)
                .bind(order)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
