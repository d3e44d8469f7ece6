use sqlx::PgPool;

use crate::error::Result;

#[derive(Clone, Debug)]
pub struct AdminRepo {
    pool: PgPool,
}

impl AdminRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hard-delete soft-deleted files; cascades remove their scenes,
    /// faces, and embeddings.
    pub async fn purge_deleted(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM video_files WHERE deleted_at IS NOT NULL")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Hard-delete files whose path is under none of the current watch
    /// roots (a root was removed from config, its rows linger).
    pub async fn purge_orphans(&self, watch_roots: &[String]) -> Result<u64> {
        let prefixes: Vec<String> = watch_roots
            .iter()
            .map(|root| {
                let mut p = root.trim_end_matches('/').to_string();
                p.push('/');
                p
            })
            .collect();

        let result = sqlx::query(
            r#"
            DELETE FROM video_files
            WHERE NOT EXISTS (
                SELECT 1 FROM UNNEST($1::TEXT[]) AS root(prefix)
                WHERE video_files.path LIKE root.prefix || '%'
            )
            "#,
        )
        .bind(&prefixes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete all enrichment data. Config survives; confirmation is the
    /// caller's responsibility.
    pub async fn wipe(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        // video_files cascades through scenes to faces and embeddings,
        // and through the queue.
        sqlx::query("DELETE FROM video_files")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
