use pgvector::Vector;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};

use crate::database::models::{Image, ImageEmbedding, MAIN_CATEGORY_ROUTER};
use crate::error::CoreResult;

/// A tag vector joined with the tag columns auto-tagging needs.
#[derive(Debug, Clone)]
pub struct TagVector {
    pub tag_id: i64,
    pub name: String,
    pub main_category: Option<String>,
    pub sub_category_id: Option<String>,
    pub vector: Vec<f32>,
}

impl TagVector {
    pub fn is_category_router(&self) -> bool {
        self.sub_category_id.as_deref() == Some(MAIN_CATEGORY_ROUTER)
    }
}

impl FromRow<'_, PgRow> for TagVector {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let vector: Vector = row.try_get("embedding")?;
        Ok(TagVector {
            tag_id: row.try_get("tag_id")?,
            name: row.try_get("name")?,
            main_category: row.try_get("main_category")?,
            sub_category_id: row.try_get("sub_category_id")?,
            vector: vector.to_vec(),
        })
    }
}

/// An image paired with its cosine distance to a search query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredImage {
    #[serde(flatten)]
    pub image: Image,
    pub distance: f64,
}

impl FromRow<'_, PgRow> for ScoredImage {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(ScoredImage {
            image: Image::from_row(row)?,
            distance: row.try_get("distance")?,
        })
    }
}

/// Storage for image and tag embedding vectors.
#[derive(Clone)]
pub struct EmbeddingRepo {
    pool: PgPool,
}

impl EmbeddingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the vector for `(image_id, model_name)`.
    pub async fn upsert_image_embedding(
        &self,
        image_id: i64,
        model_name: &str,
        embedding: &[f32],
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO image_embeddings (image_id, model_name, dimension, embedding)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (image_id, model_name)
             DO UPDATE SET embedding = EXCLUDED.embedding,
                           dimension = EXCLUDED.dimension,
                           updated_at = now()",
        )
        .bind(image_id)
        .bind(model_name)
        .bind(embedding.len() as i32)
        .bind(Vector::from(embedding.to_vec()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_image_embedding(
        &self,
        image_id: i64,
        model_name: &str,
    ) -> CoreResult<Option<ImageEmbedding>> {
        let embedding = sqlx::query_as(
            "SELECT * FROM image_embeddings WHERE image_id = $1 AND model_name = $2",
        )
        .bind(image_id)
        .bind(model_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(embedding)
    }

    /// Ids of live images that have no embedding yet for this model.
    pub async fn image_ids_missing(&self, model_name: &str, limit: i64) -> CoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT i.id FROM images i
             LEFT JOIN image_embeddings e
               ON e.image_id = i.id AND e.model_name = $1
             WHERE e.id IS NULL AND i.deleted = FALSE
             ORDER BY i.id
             LIMIT $2",
        )
        .bind(model_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn upsert_tag_embedding(
        &self,
        tag_id: i64,
        model_name: &str,
        embedding: &[f32],
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO tag_embeddings (tag_id, model_name, dimension, embedding)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (tag_id, model_name)
             DO UPDATE SET embedding = EXCLUDED.embedding,
                           dimension = EXCLUDED.dimension,
                           updated_at = now()",
        )
        .bind(tag_id)
        .bind(model_name)
        .bind(embedding.len() as i32)
        .bind(Vector::from(embedding.to_vec()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Ids of tags that carry a vector description but no embedding yet for
    /// this model.
    pub async fn tag_ids_missing(&self, model_name: &str, limit: i64) -> CoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT t.id FROM tags t
             LEFT JOIN tag_embeddings e
               ON e.tag_id = t.id AND e.model_name = $1
             WHERE e.id IS NULL
               AND t.vector_description IS NOT NULL
               AND t.vector_description <> ''
             ORDER BY t.id
             LIMIT $2",
        )
        .bind(model_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// All embeddings of one model for live images, for the clustering
    /// pipeline.
    pub async fn embeddings_for_model(
        &self,
        model_name: &str,
    ) -> CoreResult<Vec<ImageEmbedding>> {
        let embeddings = sqlx::query_as(
            "SELECT e.* FROM image_embeddings e
             JOIN images i ON i.id = e.image_id
             WHERE e.model_name = $1 AND i.deleted = FALSE
             ORDER BY e.image_id",
        )
        .bind(model_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(embeddings)
    }

    /// All tag vectors of one model joined with the tag metadata the
    /// tagging service routes on. Router vectors are included; albums never
    /// carry vector descriptions so they do not show up here.
    pub async fn tag_vectors(&self, model_name: &str) -> CoreResult<Vec<TagVector>> {
        let vectors = sqlx::query_as(
            "SELECT e.tag_id, t.name, t.main_category, t.sub_category_id, e.embedding
             FROM tag_embeddings e
             JOIN tags t ON t.id = e.tag_id
             WHERE e.model_name = $1",
        )
        .bind(model_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(vectors)
    }

    /// Cosine-distance search over image embeddings, ascending. A `Some`
    /// candidate list restricts the search to those ids; callers handle the
    /// empty-list case before reaching the database.
    pub async fn search_images(
        &self,
        model_name: &str,
        query: &[f32],
        candidate_ids: Option<&[i64]>,
        limit: i64,
    ) -> CoreResult<Vec<ScoredImage>> {
        let results = sqlx::query_as(
            "SELECT i.*, (e.embedding <=> $1)::float8 AS distance
             FROM image_embeddings e
             JOIN images i ON i.id = e.image_id
             WHERE e.model_name = $2
               AND i.deleted = FALSE
               AND ($3::BIGINT[] IS NULL OR i.id = ANY($3))
             ORDER BY e.embedding <=> $1
             LIMIT $4",
        )
        .bind(Vector::from(query.to_vec()))
        .bind(model_name)
        .bind(candidate_ids.map(|ids| ids.to_vec()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }
}
