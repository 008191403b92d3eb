// Embeds original images. When the client can also score aesthetics, the
// same call writes the AI score.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::core::ModelClient;
use crate::ai::load_balancer::ModelEndpoint;
use crate::config::ConfigHandle;
use crate::database::models::TaskType;
use crate::database::queries::{EmbeddingRepo, ImageRepo};
use crate::error::{CoreError, CoreResult};
use crate::services::TaggingService;
use crate::storage::StorageRegistry;

use super::TaskProcessor;

pub struct ImageEmbeddingProcessor {
    embeddings: EmbeddingRepo,
    images: ImageRepo,
    storages: Arc<StorageRegistry>,
    tagging: TaggingService,
    config: Arc<ConfigHandle>,
}

impl ImageEmbeddingProcessor {
    pub fn new(
        embeddings: EmbeddingRepo,
        images: ImageRepo,
        storages: Arc<StorageRegistry>,
        tagging: TaggingService,
        config: Arc<ConfigHandle>,
    ) -> Self {
        Self {
            embeddings,
            images,
            storages,
            tagging,
            config,
        }
    }
}

#[async_trait]
impl TaskProcessor for ImageEmbeddingProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::ImageEmbedding
    }

    async fn find_pending_items(&self, model_name: &str, limit: i64) -> CoreResult<Vec<i64>> {
        self.embeddings.image_ids_missing(model_name, limit).await
    }

    async fn process_item(&self, item_id: i64, endpoint: &ModelEndpoint) -> CoreResult<()> {
        let image = self
            .images
            .get(item_id)
            .await?
            .ok_or_else(|| CoreError::Data(format!("image {} not found", item_id)))?;
        if image.deleted {
            return Err(CoreError::Data(format!("image {} is deleted", item_id)));
        }

        let storage = self.storages.get(&image.storage_id)?;
        let data = storage.download(&image.relative_path).await?;
        let model_name = &endpoint.model.name;

        let vector = if let Some(aesthetic) = endpoint.client.as_aesthetic() {
            let (vector, score) = aesthetic
                .embedding_with_aesthetics(&data, model_name)
                .await?;
            self.images.set_ai_score(image.id, score).await?;
            vector
        } else {
            endpoint
                .client
                .embedding(Some(&data), None, model_name)
                .await?
        };

        self.embeddings
            .upsert_image_embedding(image.id, model_name, &vector)
            .await?;

        // Auto-tagging rides on the tagging model's embedding. A tagging
        // failure must not fail the stored embedding.
        let config = self.config.snapshot();
        if config.auto_tag_enabled && *model_name == config.tag_model {
            if let Err(e) = self
                .tagging
                .tag_image(image.id, &vector, model_name, &config)
                .await
            {
                tracing::warn!("Auto-tagging failed for image {}: {}", image.id, e);
            }
        }

        Ok(())
    }

    fn supported_by(&self, client: &dyn ModelClient) -> bool {
        client.supports_embedding()
    }
}
