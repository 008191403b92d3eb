// Registry entry for the smart-album task type. The work itself is driven
// by the smart-album service, never by the queue consumer.

use async_trait::async_trait;

use crate::ai::core::ModelClient;
use crate::ai::load_balancer::ModelEndpoint;
use crate::database::models::TaskType;
use crate::error::{CoreError, CoreResult};

use super::TaskProcessor;

pub struct SmartAlbumProcessor;

#[async_trait]
impl TaskProcessor for SmartAlbumProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::SmartAlbum
    }

    async fn find_pending_items(&self, _model_name: &str, _limit: i64) -> CoreResult<Vec<i64>> {
        Ok(Vec::new())
    }

    async fn process_item(&self, _item_id: i64, _endpoint: &ModelEndpoint) -> CoreResult<()> {
        Err(CoreError::Invariant(
            "smart-album tasks run through their own service".into(),
        ))
    }

    fn supported_by(&self, client: &dyn ModelClient) -> bool {
        client.as_clustering().is_some()
    }
}
