// Embeds tag vector descriptions so images can be auto-tagged against them.

use async_trait::async_trait;

use crate::ai::core::ModelClient;
use crate::ai::load_balancer::ModelEndpoint;
use crate::database::models::TaskType;
use crate::database::queries::{EmbeddingRepo, TagRepo};
use crate::error::{CoreError, CoreResult};

use super::TaskProcessor;

pub struct TagEmbeddingProcessor {
    embeddings: EmbeddingRepo,
    tags: TagRepo,
}

impl TagEmbeddingProcessor {
    pub fn new(embeddings: EmbeddingRepo, tags: TagRepo) -> Self {
        Self { embeddings, tags }
    }
}

#[async_trait]
impl TaskProcessor for TagEmbeddingProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::TagEmbedding
    }

    async fn find_pending_items(&self, model_name: &str, limit: i64) -> CoreResult<Vec<i64>> {
        self.embeddings.tag_ids_missing(model_name, limit).await
    }

    async fn process_item(&self, item_id: i64, endpoint: &ModelEndpoint) -> CoreResult<()> {
        let tag = self
            .tags
            .get(item_id)
            .await?
            .ok_or_else(|| CoreError::Data(format!("tag {} not found", item_id)))?;
        let description = tag
            .vector_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                CoreError::Data(format!("tag {} has no vector description", item_id))
            })?;

        let vector = endpoint
            .client
            .embedding(None, Some(description), &endpoint.model.name)
            .await?;
        self.embeddings
            .upsert_tag_embedding(tag.id, &endpoint.model.name, &vector)
            .await?;
        Ok(())
    }

    fn supported_by(&self, client: &dyn ModelClient) -> bool {
        client.supports_embedding()
    }
}
