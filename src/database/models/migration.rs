use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationType {
    Original,
    Thumbnail,
}

impl MigrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationType::Original => "original",
            MigrationType::Thumbnail => "thumbnail",
        }
    }

    pub fn from_str(s: &str) -> MigrationType {
        match s {
            "thumbnail" => MigrationType::Thumbnail,
            _ => MigrationType::Original,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Running => "running",
            MigrationStatus::Paused => "paused",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
            MigrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> MigrationStatus {
        match s {
            "running" => MigrationStatus::Running,
            "paused" => MigrationStatus::Paused,
            "completed" => MigrationStatus::Completed,
            "failed" => MigrationStatus::Failed,
            "cancelled" => MigrationStatus::Cancelled,
            _ => MigrationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRecordStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl FileRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRecordStatus::Pending => "pending",
            FileRecordStatus::InProgress => "in_progress",
            FileRecordStatus::Success => "success",
            FileRecordStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> FileRecordStatus {
        match s {
            "in_progress" => FileRecordStatus::InProgress,
            "success" => FileRecordStatus::Success,
            "failed" => FileRecordStatus::Failed,
            _ => FileRecordStatus::Pending,
        }
    }
}

/// One storage migration. Processed/failed counts are always derived from
/// the file records, never stored on this row.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationTask {
    pub id: Uuid,
    pub migration_type: MigrationType,
    pub source_storage_id: String,
    pub target_storage_id: String,
    pub status: MigrationStatus,
    pub total_files: i64,
    pub delete_source: bool,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for MigrationTask {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let migration_type: String = row.try_get("migration_type")?;
        let status: String = row.try_get("status")?;
        Ok(MigrationTask {
            id: row.try_get("id")?,
            migration_type: MigrationType::from_str(&migration_type),
            source_storage_id: row.try_get("source_storage_id")?,
            target_storage_id: row.try_get("target_storage_id")?,
            status: MigrationStatus::from_str(&status),
            total_files: row.try_get("total_files")?,
            delete_source: row.try_get("delete_source")?,
            error: row.try_get("error")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Per-file state machine backing a migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationFileRecord {
    pub id: i64,
    pub task_id: Uuid,
    pub image_id: i64,
    pub status: FileRecordStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for MigrationFileRecord {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(MigrationFileRecord {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            image_id: row.try_get("image_id")?,
            status: FileRecordStatus::from_str(&status),
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Migration task enriched with counts derived from its file records.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationTaskView {
    #[serde(flatten)]
    pub task: MigrationTask,
    pub processed_files: i64,
    pub failed_files: i64,
}
