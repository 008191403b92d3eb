// Scores images that still lack an AI score. Decoupled from embedding for
// providers that cannot combine the two calls.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::core::ModelClient;
use crate::ai::load_balancer::ModelEndpoint;
use crate::database::models::TaskType;
use crate::database::queries::ImageRepo;
use crate::error::{CoreError, CoreResult};
use crate::storage::StorageRegistry;

use super::TaskProcessor;

pub struct AestheticScoreProcessor {
    images: ImageRepo,
    storages: Arc<StorageRegistry>,
}

impl AestheticScoreProcessor {
    pub fn new(images: ImageRepo, storages: Arc<StorageRegistry>) -> Self {
        Self { images, storages }
    }
}

#[async_trait]
impl TaskProcessor for AestheticScoreProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::AestheticScore
    }

    async fn find_pending_items(&self, _model_name: &str, limit: i64) -> CoreResult<Vec<i64>> {
        self.images.ids_missing_score(limit).await
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

        let aesthetic = endpoint.client.as_aesthetic().ok_or_else(|| {
            CoreError::CapabilityMismatch {
                model: endpoint.model.name.clone(),
                capability: "aesthetic scoring",
            }
        })?;

        let storage = self.storages.get(&image.storage_id)?;
        let data = storage.download(&image.relative_path).await?;
        let (_, score) = aesthetic
            .embedding_with_aesthetics(&data, &endpoint.model.name)
            .await?;
        self.images.set_ai_score(image.id, score).await?;
        Ok(())
    }

    fn supported_by(&self, client: &dyn ModelClient) -> bool {
        client.as_aesthetic().is_some()
    }
}
