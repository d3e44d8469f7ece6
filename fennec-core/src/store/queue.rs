use sqlx::PgPool;

use crate::error::Result;
use crate::types::queue::{CurrentJob, QueueItem, QueueSnapshot, QueueStatus};

#[derive(Clone, Debug)]
pub struct QueueRepo {
    pool: PgPool,
}

impl QueueRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a file for enrichment. A file already queued keeps its
    /// place but is reset to pending with a fresh queue time.
    pub async fn enqueue(&self, file_id: i64) -> Result<QueueItem> {
        let row = sqlx::query_as::<_, QueueItem>(
            r#"
            INSERT INTO enrichment_queue (file_id)
            VALUES ($1)
            ON CONFLICT (file_id) DO UPDATE SET
                status = 'pending',
                queued_at = NOW(),
                started_at = NULL,
                completed_at = NULL,
                error = NULL,
                current_stage = NULL,
                current_stage_num = 0,
                total_stages = 0
            RETURNING *
            "#,
        )
        .bind(file_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Atomically claim the oldest pending job. Two concurrent callers
    /// never observe the same row: the inner select locks with
    /// SKIP LOCKED and the status predicate fences the update.
    pub async fn claim_one(&self) -> Result<Option<QueueItem>> {
        let row = sqlx::query_as::<_, QueueItem>(
            r#"
            UPDATE enrichment_queue SET
                status = 'processing',
                started_at = NOW(),
                error = NULL
            WHERE id = (
                SELECT id FROM enrichment_queue
                WHERE status = 'pending'
                ORDER BY queued_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND status = 'pending'
            RETURNING *
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_stage(
        &self,
        id: i64,
        stage: &str,
        stage_num: i32,
        total_stages: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrichment_queue SET
                current_stage = $2,
                current_stage_num = $3,
                total_stages = $4
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(stage)
        .bind(stage_num)
        .bind(total_stages)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn complete(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrichment_queue SET
                status = 'complete',
                completed_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail(&self, id: i64, message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrichment_queue SET
                status = 'failed',
                error = $2,
                retry_count = retry_count + 1,
                completed_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Return a claimed job to pending without counting a retry; used
    /// when the failure was environmental (model host not loaded).
    pub async fn release(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrichment_queue SET
                status = 'pending',
                started_at = NULL
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn reset_failed(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE enrichment_queue SET status = 'pending', error = NULL WHERE status = 'failed'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reclaim rows orphaned by a crash. Run at ingest startup and from
    /// the admin surface.
    pub async fn reset_processing(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE enrichment_queue SET
                status = 'pending',
                started_at = NULL
            WHERE status = 'processing'
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM enrichment_queue GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut snapshot = QueueSnapshot {
            pending: 0,
            processing: 0,
            complete: 0,
            failed: 0,
            current: None,
        };
        for (status, count) in counts {
            match status.parse::<QueueStatus>() {
                Ok(QueueStatus::Pending) => snapshot.pending = count,
                Ok(QueueStatus::Processing) => snapshot.processing = count,
                Ok(QueueStatus::Complete) => snapshot.complete = count,
                Ok(QueueStatus::Failed) => snapshot.failed = count,
                Err(_) => {}
            }
        }

        snapshot.current = self.current().await?;
        Ok(snapshot)
    }

    /// The currently-processing item joined with its file, if any.
    pub async fn current(&self) -> Result<Option<CurrentJob>> {
        let row = sqlx::query_as::<_, CurrentJob>(
            r#"
            SELECT q.id AS queue_id,
                   q.file_id,
                   v.path,
                   v.filename,
                   q.current_stage,
                   q.current_stage_num,
                   q.total_stages,
                   q.retry_count
            FROM enrichment_queue q
            JOIN video_files v ON v.id = q.file_id
            WHERE q.status = 'processing'
            ORDER BY q.started_at
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
