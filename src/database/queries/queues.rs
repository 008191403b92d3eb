use serde::Serialize;
use sqlx::{PgPool, Row};

use crate::database::models::{AiQueue, AiTaskItem, QueueStatus, TaskType};
use crate::error::CoreResult;

/// Pending/failed counts for one queue.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusEntry {
    pub id: i64,
    pub task_type: TaskType,
    pub model_name: String,
    pub status: QueueStatus,
    pub pending_count: i64,
    pub failed_count: i64,
}

/// Operator-facing snapshot of every queue, pushed over the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusSummary {
    pub queues: Vec<QueueStatusEntry>,
    pub total_pending: i64,
    pub total_failed: i64,
}

/// Durable storage for queues and task items. Holds its own pool handle;
/// all SQL touching `ai_queues`/`ai_task_items` lives here.
#[derive(Clone)]
pub struct QueueRepo {
    pool: PgPool,
}

impl QueueRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazily create the queue for `(task_type, model_name)`.
    pub async fn find_or_create(
        &self,
        task_type: TaskType,
        model_name: &str,
    ) -> CoreResult<AiQueue> {
        let key = crate::database::models::queue_key(task_type, model_name);
        let queue: AiQueue = sqlx::query_as(
            "INSERT INTO ai_queues (queue_key, task_type, model_name)
             VALUES ($1, $2, $3)
             ON CONFLICT (queue_key) DO UPDATE SET updated_at = now()
             RETURNING *",
        )
        .bind(&key)
        .bind(task_type.as_str())
        .bind(model_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(queue)
    }

    pub async fn get(&self, id: i64) -> CoreResult<Option<AiQueue>> {
        let queue = sqlx::query_as("SELECT * FROM ai_queues WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(queue)
    }

    pub async fn list(&self) -> CoreResult<Vec<AiQueue>> {
        let queues = sqlx::query_as("SELECT * FROM ai_queues ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(queues)
    }

    pub async fn set_status(&self, id: i64, status: QueueStatus) -> CoreResult<()> {
        sqlx::query("UPDATE ai_queues SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every queue whose model is no longer in the live inventory,
    /// together with its task items, in one transaction. Returns the
    /// removed queues.
    pub async fn delete_queues_for_dead_models(
        &self,
        live_models: &[String],
    ) -> CoreResult<Vec<AiQueue>> {
        let mut tx = self.pool.begin().await?;

        let dead: Vec<AiQueue> =
            sqlx::query_as("SELECT * FROM ai_queues WHERE model_name <> ALL($1)")
                .bind(live_models)
                .fetch_all(&mut *tx)
                .await?;

        if dead.is_empty() {
            return Ok(dead);
        }

        let keys: Vec<String> = dead.iter().map(|q| q.queue_key.clone()).collect();
        sqlx::query("DELETE FROM ai_task_items WHERE queue_key = ANY($1)")
            .bind(&keys)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM ai_queues WHERE queue_key = ANY($1)")
            .bind(&keys)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(dead)
    }

    /// Bulk-insert task items, silently skipping `(item_id, queue_key)`
    /// duplicates. Returns the number of rows actually inserted.
    pub async fn add_items(&self, queue: &AiQueue, item_ids: &[i64]) -> CoreResult<u64> {
        if item_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "INSERT INTO ai_task_items (task_id, item_id, task_type, queue_key)
             SELECT $1, ids.id, $2, $3 FROM UNNEST($4::BIGINT[]) AS ids(id)
             ON CONFLICT (item_id, queue_key) DO NOTHING",
        )
        .bind(queue.id)
        .bind(queue.task_type.as_str())
        .bind(&queue.queue_key)
        .bind(item_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Pick the next queue with pending work. Tag-embedding queues win the
    /// tie so automatic tagging unblocks as early as possible.
    pub async fn next_pending_queue(&self) -> CoreResult<Option<AiQueue>> {
        let queue = sqlx::query_as(
            "SELECT q.* FROM ai_queues q
             WHERE EXISTS (
                 SELECT 1 FROM ai_task_items i
                 WHERE i.queue_key = q.queue_key AND i.status = 'pending'
             )
             ORDER BY (q.task_type = 'tag-embedding') DESC, q.updated_at ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(queue)
    }

    /// Pending items in FIFO order.
    pub async fn pending_items(&self, queue_key: &str, limit: i64) -> CoreResult<Vec<AiTaskItem>> {
        let items = sqlx::query_as(
            "SELECT * FROM ai_task_items
             WHERE queue_key = $1 AND status = 'pending'
             ORDER BY created_at ASC
             LIMIT $2",
        )
        .bind(queue_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn get_item(&self, id: i64) -> CoreResult<Option<AiTaskItem>> {
        let item = sqlx::query_as("SELECT * FROM ai_task_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Remove a completed item.
    pub async fn delete_item(&self, id: i64) -> CoreResult<()> {
        sqlx::query("DELETE FROM ai_task_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn fail_item(&self, id: i64, error: &str) -> CoreResult<()> {
        sqlx::query(
            "UPDATE ai_task_items SET status = 'failed', error = $2, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fail every pending item of a queue in one statement. Used when the
    /// queue's model has no client at all.
    pub async fn fail_all_pending(&self, queue_key: &str, error: &str) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE ai_task_items SET status = 'failed', error = $2, updated_at = now()
             WHERE queue_key = $1 AND status = 'pending'",
        )
        .bind(queue_key)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reset a failed item to pending and clear its error.
    pub async fn retry_item(&self, id: i64) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE ai_task_items SET status = 'pending', error = NULL, updated_at = now()
             WHERE id = $1 AND status = 'failed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop a failed item the operator chose to ignore.
    pub async fn ignore_item(&self, id: i64) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM ai_task_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn retry_failed_in_queue(&self, queue_key: &str) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE ai_task_items SET status = 'pending', error = NULL, updated_at = now()
             WHERE queue_key = $1 AND status = 'failed'",
        )
        .bind(queue_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn queue_stats(&self, queue_key: &str) -> CoreResult<QueueStats> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                 COUNT(*) FILTER (WHERE status = 'failed') AS failed
             FROM ai_task_items WHERE queue_key = $1",
        )
        .bind(queue_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(QueueStats {
            pending: row.try_get("pending")?,
            failed: row.try_get("failed")?,
        })
    }

    /// Full per-queue status used by the operator UI and the notifier.
    pub async fn status_summary(&self) -> CoreResult<QueueStatusSummary> {
        let rows = sqlx::query(
            "SELECT q.id, q.task_type, q.model_name, q.status,
                    COUNT(i.id) FILTER (WHERE i.status = 'pending') AS pending_count,
                    COUNT(i.id) FILTER (WHERE i.status = 'failed') AS failed_count
             FROM ai_queues q
             LEFT JOIN ai_task_items i ON i.queue_key = q.queue_key
             GROUP BY q.id, q.task_type, q.model_name, q.status
             ORDER BY q.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut queues = Vec::with_capacity(rows.len());
        let mut total_pending = 0;
        let mut total_failed = 0;
        for row in rows {
            let task_type_str: String = row.try_get("task_type")?;
            let Some(task_type) = TaskType::from_str(&task_type_str) else {
                continue;
            };
            let status_str: String = row.try_get("status")?;
            let pending_count: i64 = row.try_get("pending_count")?;
            let failed_count: i64 = row.try_get("failed_count")?;
            total_pending += pending_count;
            total_failed += failed_count;
            queues.push(QueueStatusEntry {
                id: row.try_get("id")?,
                task_type,
                model_name: row.try_get("model_name")?,
                status: QueueStatus::from_str(&status_str),
                pending_count,
                failed_count,
            });
        }

        Ok(QueueStatusSummary {
            queues,
            total_pending,
            total_failed,
        })
    }

    /// Paginated failed items of one queue, newest first.
    pub async fn failed_items_page(
        &self,
        queue_key: &str,
        page: i64,
        page_size: i64,
    ) -> CoreResult<(Vec<AiTaskItem>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ai_task_items WHERE queue_key = $1 AND status = 'failed'")
                .bind(queue_key)
                .fetch_one(&self.pool)
                .await?;

        let offset = (page.max(1) - 1) * page_size;
        let items = sqlx::query_as(
            "SELECT * FROM ai_task_items
             WHERE queue_key = $1 AND status = 'failed'
             ORDER BY updated_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(queue_key)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((items, total))
    }
}
