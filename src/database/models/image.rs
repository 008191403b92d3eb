use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Image row, limited to the columns the AI core touches.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Image {
    pub id: i64,
    pub file_name: String,
    pub relative_path: String,
    pub thumbnail_path: Option<String>,
    pub storage_id: String,
    pub thumbnail_storage_id: String,
    pub ai_score: Option<f32>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
