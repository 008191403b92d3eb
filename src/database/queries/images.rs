use sqlx::PgPool;

use crate::database::models::Image;
use crate::error::CoreResult;

#[derive(Clone)]
pub struct ImageRepo {
    pool: PgPool,
}

impl ImageRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> CoreResult<Option<Image>> {
        let image = sqlx::query_as("SELECT * FROM images WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(image)
    }

    pub async fn get_many(&self, ids: &[i64]) -> CoreResult<Vec<Image>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let images = sqlx::query_as("SELECT * FROM images WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(images)
    }

    pub async fn set_ai_score(&self, id: i64, score: f32) -> CoreResult<()> {
        sqlx::query("UPDATE images SET ai_score = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(score)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ids of live images that still need an aesthetic score.
    pub async fn ids_missing_score(&self, limit: i64) -> CoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM images
             WHERE ai_score IS NULL AND deleted = FALSE
             ORDER BY id
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn set_storage_id(&self, id: i64, storage_id: &str) -> CoreResult<()> {
        sqlx::query("UPDATE images SET storage_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(storage_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_thumbnail_storage_id(&self, id: i64, storage_id: &str) -> CoreResult<()> {
        sqlx::query(
            "UPDATE images SET thumbnail_storage_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(storage_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
