use sqlx::PgPool;

use crate::database::models::{Tag, TagType};
use crate::error::CoreResult;

#[derive(Clone)]
pub struct TagRepo {
    pool: PgPool,
}

impl TagRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> CoreResult<Option<Tag>> {
        let tag = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    pub async fn get_many(&self, ids: &[i64]) -> CoreResult<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let tags = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    /// Names of all smart albums, for the `智能相册 #N` suffix scan.
    pub async fn smart_album_names(&self) -> CoreResult<Vec<String>> {
        let names = sqlx::query_scalar("SELECT name FROM tags WHERE is_smart_album = TRUE")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// Create an album tag. Smart albums record their provisional cover.
    pub async fn create_album(
        &self,
        name: &str,
        cover_image_id: Option<i64>,
        is_smart_album: bool,
    ) -> CoreResult<Tag> {
        let tag = sqlx::query_as(
            "INSERT INTO tags (name, tag_type, is_smart_album, cover_image_id)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(name)
        .bind(TagType::Album.as_str())
        .bind(is_smart_album)
        .bind(cover_image_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(tag)
    }

    /// Attach a set of images to one tag/album.
    pub async fn attach_images(&self, tag_id: i64, image_ids: &[i64]) -> CoreResult<u64> {
        if image_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "INSERT INTO image_tags (image_id, tag_id)
             SELECT ids.id, $1 FROM UNNEST($2::BIGINT[]) AS ids(id)
             ON CONFLICT DO NOTHING",
        )
        .bind(tag_id)
        .bind(image_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Attach a set of tags to one image (auto-tagging writes these links).
    pub async fn link_image_tags(&self, image_id: i64, tag_ids: &[i64]) -> CoreResult<u64> {
        if tag_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "INSERT INTO image_tags (image_id, tag_id)
             SELECT $1, ids.id FROM UNNEST($2::BIGINT[]) AS ids(id)
             ON CONFLICT DO NOTHING",
        )
        .bind(image_id)
        .bind(tag_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
