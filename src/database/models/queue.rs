use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// The kinds of AI work the scheduler dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    ImageEmbedding,
    AestheticScore,
    TagEmbedding,
    SmartAlbum,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::ImageEmbedding => "image-embedding",
            TaskType::AestheticScore => "aesthetic-score",
            TaskType::TagEmbedding => "tag-embedding",
            TaskType::SmartAlbum => "smart-album",
        }
    }

    pub fn from_str(s: &str) -> Option<TaskType> {
        match s {
            "image-embedding" => Some(TaskType::ImageEmbedding),
            "aesthetic-score" => Some(TaskType::AestheticScore),
            "tag-embedding" => Some(TaskType::TagEmbedding),
            "smart-album" => Some(TaskType::SmartAlbum),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic key identifying one queue: `"{task_type}:{model_name}"`.
pub fn queue_key(task_type: TaskType, model_name: &str) -> String {
    format!("{}:{}", task_type.as_str(), model_name)
}

/// Split a queue key back into its task type and model name.
pub fn parse_queue_key(key: &str) -> Option<(TaskType, &str)> {
    let (task_type, model_name) = key.split_once(':')?;
    Some((TaskType::from_str(task_type)?, model_name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Idle,
    Processing,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Idle => "idle",
            QueueStatus::Processing => "processing",
        }
    }

    pub fn from_str(s: &str) -> QueueStatus {
        match s {
            "processing" => QueueStatus::Processing,
            _ => QueueStatus::Idle,
        }
    }
}

/// One scheduler queue, unique per `(task_type, model_name)`.
#[derive(Debug, Clone, Serialize)]
pub struct AiQueue {
    pub id: i64,
    pub queue_key: String,
    pub task_type: TaskType,
    pub model_name: String,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for AiQueue {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let task_type_str: String = row.try_get("task_type")?;
        let task_type = TaskType::from_str(&task_type_str).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "task_type".into(),
                source: format!("unknown task type '{}'", task_type_str).into(),
            }
        })?;
        let status_str: String = row.try_get("status")?;

        Ok(AiQueue {
            id: row.try_get("id")?,
            queue_key: row.try_get("queue_key")?,
            task_type,
            model_name: row.try_get("model_name")?,
            status: QueueStatus::from_str(&status_str),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskItemStatus {
    Pending,
    Failed,
}

impl TaskItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskItemStatus::Pending => "pending",
            TaskItemStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> TaskItemStatus {
        match s {
            "failed" => TaskItemStatus::Failed,
            _ => TaskItemStatus::Pending,
        }
    }
}

/// Typed payload attached to a task item. Only smart-album submissions carry
/// one; the scheduler itself never reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    SmartAlbum(SmartAlbumParams),
}

/// Parameters forwarded to the clustering endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartAlbumParams {
    pub model_name: String,
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    #[serde(default)]
    pub min_samples: Option<usize>,
    #[serde(default)]
    pub umap: Option<UmapParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UmapParams {
    pub n_components: usize,
    pub n_neighbors: usize,
}

fn default_min_cluster_size() -> usize {
    5
}

/// One unit of AI work, unique per `(item_id, queue_key)`.
#[derive(Debug, Clone, Serialize)]
pub struct AiTaskItem {
    pub id: i64,
    pub task_id: i64,
    pub item_id: i64,
    pub task_type: TaskType,
    pub queue_key: String,
    pub status: TaskItemStatus,
    pub error: Option<String>,
    pub extra: Option<TaskPayload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for AiTaskItem {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let task_type_str: String = row.try_get("task_type")?;
        let task_type = TaskType::from_str(&task_type_str).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "task_type".into(),
                source: format!("unknown task type '{}'", task_type_str).into(),
            }
        })?;
        let status_str: String = row.try_get("status")?;
        let extra_json: Option<serde_json::Value> = row.try_get("extra")?;
        let extra = match extra_json {
            None => None,
            Some(value) if value.is_null() => None,
            Some(value) => {
                Some(
                    serde_json::from_value(value).map_err(|e| sqlx::Error::ColumnDecode {
                        index: "extra".into(),
                        source: Box::new(e),
                    })?,
                )
            }
        };

        Ok(AiTaskItem {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            item_id: row.try_get("item_id")?,
            task_type,
            queue_key: row.try_get("queue_key")?,
            status: TaskItemStatus::from_str(&status_str),
            error: row.try_get("error")?,
            extra,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_key_round_trip() {
        let key = queue_key(TaskType::ImageEmbedding, "clip-vit-b32");
        assert_eq!(key, "image-embedding:clip-vit-b32");

        let (task_type, model_name) = parse_queue_key(&key).unwrap();
        assert_eq!(task_type, TaskType::ImageEmbedding);
        assert_eq!(model_name, "clip-vit-b32");
    }

    #[test]
    fn test_parse_queue_key_keeps_colons_in_model_name() {
        let (task_type, model_name) = parse_queue_key("tag-embedding:org/model:v2").unwrap();
        assert_eq!(task_type, TaskType::TagEmbedding);
        assert_eq!(model_name, "org/model:v2");
    }

    #[test]
    fn test_parse_queue_key_rejects_unknown_task_type() {
        assert!(parse_queue_key("face-detect:modelA").is_none());
        assert!(parse_queue_key("no-separator").is_none());
    }
}
