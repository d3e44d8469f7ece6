use pgvector::Vector;
use sqlx::PgPool;

use crate::error::Result;
use crate::types::scene::{EmbeddingSummary, SceneEmbedding};

/// A scene admitted by a vector similarity query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SceneMatch {
    pub scene_id: i64,
    pub similarity: f64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingRepo {
    pool: PgPool,
}

impl EmbeddingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert keyed on (scene, model); a newer model version overwrites
    /// the earlier row.
    pub async fn upsert(
        &self,
        scene_id: i64,
        model_name: &str,
        model_version: &str,
        embedding: &[f32],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scene_embeddings (scene_id, model_name, model_version, dim, embedding)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (scene_id, model_name) DO UPDATE SET
                model_version = EXCLUDED.model_version,
                dim = EXCLUDED.dim,
                embedding = EXCLUDED.embedding
            "#,
        )
        .bind(scene_id)
        .bind(model_name)
        .bind(model_version)
        .bind(embedding.len() as i32)
        .bind(Vector::from(embedding.to_vec()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, scene_id: i64, model_name: &str) -> Result<Option<SceneEmbedding>> {
        let row = sqlx::query_as::<_, SceneEmbedding>(
            "SELECT * FROM scene_embeddings WHERE scene_id = $1 AND model_name = $2",
        )
        .bind(scene_id)
        .bind(model_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// The stored version for (scene, model), used for the
    /// skip-on-matching-version check during re-enrichment.
    pub async fn stored_version(&self, scene_id: i64, model_name: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT model_version FROM scene_embeddings WHERE scene_id = $1 AND model_name = $2",
        )
        .bind(scene_id)
        .bind(model_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(v,)| v))
    }

    pub async fn summaries_for_scene(&self, scene_id: i64) -> Result<Vec<EmbeddingSummary>> {
        let rows: Vec<(String, String, i32)> = sqlx::query_as(
            r#"
            SELECT model_name, model_version, dim
            FROM scene_embeddings
            WHERE scene_id = $1
            ORDER BY model_name
            "#,
        )
        .bind(scene_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(model_name, model_version, dim)| EmbeddingSummary {
                model_name,
                model_version,
                dim,
            })
            .collect())
    }

    /// Cosine nearest neighbours restricted to one model name. Vectors
    /// of different models share the table but not a dimension, so the
    /// restriction is load-bearing.
    pub async fn nearest(
        &self,
        model_name: &str,
        query: &[f32],
        exclude_scene_id: Option<i64>,
        min_similarity: f64,
        limit: i64,
    ) -> Result<Vec<SceneMatch>> {
        let rows = sqlx::query_as::<_, SceneMatch>(
            r#"
            SELECT e.scene_id,
                   1 - (e.embedding <=> $2) AS similarity
            FROM scene_embeddings e
            JOIN scenes s ON s.id = e.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE e.model_name = $1
              AND v.deleted_at IS NULL
              AND ($3::BIGINT IS NULL OR e.scene_id <> $3)
              AND 1 - (e.embedding <=> $2) >= $4
            ORDER BY e.embedding <=> $2
            LIMIT $5
            "#,
        )
        .bind(model_name)
        .bind(Vector::from(query.to_vec()))
        .bind(exclude_scene_id)
        .bind(min_similarity)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All scene vectors for one model, for the clustering pass.
    pub async fn list_vectors_for_model(&self, model_name: &str) -> Result<Vec<(i64, Vector)>> {
        let rows: Vec<(i64, Vector)> = sqlx::query_as(
            r#"
            SELECT e.scene_id, e.embedding
            FROM scene_embeddings e
            JOIN scenes s ON s.id = e.scene_id
            JOIN video_files v ON v.id = s.file_id
            WHERE e.model_name = $1 AND v.deleted_at IS NULL
            ORDER BY e.scene_id
            "#,
        )
        .bind(model_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
