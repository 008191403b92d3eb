use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// Stored embedding for one `(image_id, model_name)` pair.
#[derive(Debug, Clone, Serialize)]
pub struct ImageEmbedding {
    pub id: i64,
    pub image_id: i64,
    pub model_name: String,
    pub dimension: i32,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for ImageEmbedding {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let vector: pgvector::Vector = row.try_get("embedding")?;
        Ok(ImageEmbedding {
            id: row.try_get("id")?,
            image_id: row.try_get("image_id")?,
            model_name: row.try_get("model_name")?,
            dimension: row.try_get("dimension")?,
            embedding: vector.to_vec(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Stored embedding for one `(tag_id, model_name)` pair.
#[derive(Debug, Clone, Serialize)]
pub struct TagEmbedding {
    pub id: i64,
    pub tag_id: i64,
    pub model_name: String,
    pub dimension: i32,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for TagEmbedding {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let vector: pgvector::Vector = row.try_get("embedding")?;
        Ok(TagEmbedding {
            id: row.try_get("id")?,
            tag_id: row.try_get("tag_id")?,
            model_name: row.try_get("model_name")?,
            dimension: row.try_get("dimension")?,
            embedding: vector.to_vec(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
