use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::models::{
    FileRecordStatus, Image, MigrationFileRecord, MigrationStatus, MigrationTask,
    MigrationTaskView, MigrationType,
};
use crate::error::CoreResult;

/// A reserved file record together with its preloaded image row.
#[derive(Debug, Clone)]
pub struct MigrationWorkUnit {
    pub record: MigrationFileRecord,
    pub image: Image,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationCounts {
    pub processed: i64,
    pub failed: i64,
    pub pending: i64,
    pub in_progress: i64,
}

#[derive(Clone)]
pub struct MigrationRepo {
    pool: PgPool,
}

impl MigrationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn storage_column(migration_type: MigrationType) -> &'static str {
        match migration_type {
            MigrationType::Original => "storage_id",
            MigrationType::Thumbnail => "thumbnail_storage_id",
        }
    }

    /// Create the task row and one file record per candidate image, in one
    /// transaction. Returns the task with `total_files` already set.
    pub async fn create_task(
        &self,
        migration_type: MigrationType,
        source_storage_id: &str,
        target_storage_id: &str,
        delete_source: bool,
    ) -> CoreResult<MigrationTask> {
        let mut tx = self.pool.begin().await?;
        let task_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO storage_migration_tasks
                 (id, migration_type, source_storage_id, target_storage_id, delete_source)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(task_id)
        .bind(migration_type.as_str())
        .bind(source_storage_id)
        .bind(target_storage_id)
        .bind(delete_source)
        .execute(&mut *tx)
        .await?;

        let column = Self::storage_column(migration_type);
        let extra_filter = match migration_type {
            MigrationType::Original => "",
            MigrationType::Thumbnail => " AND thumbnail_path IS NOT NULL",
        };
        let insert = format!(
            "INSERT INTO migration_file_records (task_id, image_id)
             SELECT $1, id FROM images
             WHERE deleted = FALSE AND {column} = $2{extra_filter}"
        );
        let inserted = sqlx::query(&insert)
            .bind(task_id)
            .bind(source_storage_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let task: MigrationTask = sqlx::query_as(
            "UPDATE storage_migration_tasks SET total_files = $2, updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(task_id)
        .bind(inserted as i64)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    /// Count + sample of the files a migration request would touch.
    pub async fn preview(
        &self,
        migration_type: MigrationType,
        source_storage_id: &str,
    ) -> CoreResult<(i64, Vec<Image>)> {
        let column = Self::storage_column(migration_type);
        let extra_filter = match migration_type {
            MigrationType::Original => "",
            MigrationType::Thumbnail => " AND thumbnail_path IS NOT NULL",
        };

        let count_sql =
            format!("SELECT COUNT(*) FROM images WHERE deleted = FALSE AND {column} = $1{extra_filter}");
        let count: i64 = sqlx::query_scalar(&count_sql)
            .bind(source_storage_id)
            .fetch_one(&self.pool)
            .await?;

        let sample_sql = format!(
            "SELECT * FROM images WHERE deleted = FALSE AND {column} = $1{extra_filter}
             ORDER BY id LIMIT 10"
        );
        let sample = sqlx::query_as(&sample_sql)
            .bind(source_storage_id)
            .fetch_all(&self.pool)
            .await?;

        Ok((count, sample))
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Option<MigrationTask>> {
        let task = sqlx::query_as("SELECT * FROM storage_migration_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    pub async fn counts(&self, task_id: Uuid) -> CoreResult<MigrationCounts> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'success') AS processed,
                 COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                 COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress
             FROM migration_file_records WHERE task_id = $1",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(MigrationCounts {
            processed: row.try_get("processed")?,
            failed: row.try_get("failed")?,
            pending: row.try_get("pending")?,
            in_progress: row.try_get("in_progress")?,
        })
    }

    pub async fn view(&self, id: Uuid) -> CoreResult<Option<MigrationTaskView>> {
        let Some(task) = self.get(id).await? else {
            return Ok(None);
        };
        let counts = self.counts(id).await?;
        Ok(Some(MigrationTaskView {
            task,
            processed_files: counts.processed,
            failed_files: counts.failed,
        }))
    }

    /// Every task with derived progress counts, newest first.
    pub async fn list_views(&self) -> CoreResult<Vec<MigrationTaskView>> {
        let tasks: Vec<MigrationTask> =
            sqlx::query_as("SELECT * FROM storage_migration_tasks ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        let mut views = Vec::with_capacity(tasks.len());
        for task in tasks {
            let counts = self.counts(task.id).await?;
            views.push(MigrationTaskView {
                task,
                processed_files: counts.processed,
                failed_files: counts.failed,
            });
        }
        Ok(views)
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: MigrationStatus,
        error: Option<&str>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE storage_migration_tasks
             SET status = $2,
                 error = $3,
                 started_at = CASE WHEN $2 = 'running' AND started_at IS NULL
                                   THEN now() ELSE started_at END,
                 completed_at = CASE WHEN $2 IN ('completed', 'failed', 'cancelled')
                                     THEN now() ELSE completed_at END,
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reservation primitive: atomically claim up to `limit` pending records
    /// for a worker batch, flipping them to in_progress inside one
    /// transaction, then return them with the image preloaded.
    pub async fn reserve_pending(
        &self,
        task_id: Uuid,
        limit: i64,
    ) -> CoreResult<Vec<MigrationWorkUnit>> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM migration_file_records
             WHERE task_id = $1 AND status = 'pending'
             ORDER BY id
             LIMIT $2
             FOR UPDATE SKIP LOCKED",
        )
        .bind(task_id)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        sqlx::query(
            "UPDATE migration_file_records SET status = 'in_progress', updated_at = now()
             WHERE id = ANY($1)",
        )
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        let rows = sqlx::query(
            "SELECT r.id AS record_id, r.task_id, r.image_id, r.status AS record_status,
                    r.error AS record_error, r.created_at AS record_created_at,
                    r.updated_at AS record_updated_at,
                    i.*
             FROM migration_file_records r
             JOIN images i ON i.id = r.image_id
             WHERE r.id = ANY($1)
             ORDER BY r.id",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut units = Vec::with_capacity(rows.len());
        for row in rows {
            let record_status: String = row.try_get("record_status")?;
            let record = MigrationFileRecord {
                id: row.try_get("record_id")?,
                task_id: row.try_get("task_id")?,
                image_id: row.try_get("image_id")?,
                status: FileRecordStatus::from_str(&record_status),
                error: row.try_get("record_error")?,
                created_at: row.try_get("record_created_at")?,
                updated_at: row.try_get("record_updated_at")?,
            };
            let image = sqlx::FromRow::from_row(&row)?;
            units.push(MigrationWorkUnit { record, image });
        }
        Ok(units)
    }

    pub async fn mark_record(
        &self,
        record_id: i64,
        status: FileRecordStatus,
        error: Option<&str>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE migration_file_records SET status = $2, error = $3, updated_at = now()
             WHERE id = $1",
        )
        .bind(record_id)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Requeue reservations orphaned by a crash or pause. Runs before any
    /// worker is launched.
    pub async fn reset_in_progress_records(&self, task_id: Uuid) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE migration_file_records
             SET status = 'pending', updated_at = now()
             WHERE task_id = $1 AND status = 'in_progress'",
        )
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Move failed and in_progress records back to pending, for an
    /// operator-requested retry.
    pub async fn reset_incomplete_records(&self, task_id: Uuid) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE migration_file_records
             SET status = 'pending', error = NULL, updated_at = now()
             WHERE task_id = $1 AND status IN ('failed', 'in_progress')",
        )
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Remove the task and, through the FK cascade, all its file records.
    pub async fn delete_task(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM storage_migration_tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn failed_records(&self, task_id: Uuid) -> CoreResult<Vec<MigrationFileRecord>> {
        let records = sqlx::query_as(
            "SELECT * FROM migration_file_records
             WHERE task_id = $1 AND status = 'failed'
             ORDER BY updated_at DESC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
