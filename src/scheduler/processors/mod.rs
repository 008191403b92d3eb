// Task processor contract and the built-in processors.

pub mod aesthetic_score;
pub mod image_embedding;
pub mod smart_album;
pub mod tag_embedding;

use async_trait::async_trait;

use crate::ai::core::ModelClient;
use crate::ai::load_balancer::ModelEndpoint;
use crate::database::models::TaskType;
use crate::error::CoreResult;

pub use aesthetic_score::AestheticScoreProcessor;
pub use image_embedding::ImageEmbeddingProcessor;
pub use smart_album::SmartAlbumProcessor;
pub use tag_embedding::TagEmbeddingProcessor;

/// A plug-in that knows how to discover and execute one kind of AI work.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Item ids that still need work for this model. Must be idempotent
    /// and cheap; insertion dedup happens at the database layer.
    async fn find_pending_items(&self, model_name: &str, limit: i64) -> CoreResult<Vec<i64>>;

    /// Do the work for one item and persist the result.
    async fn process_item(&self, item_id: i64, endpoint: &ModelEndpoint) -> CoreResult<()>;

    /// Whether this client can serve the processor at all. Checked before
    /// dispatch; failing clients are skipped during failover.
    fn supported_by(&self, client: &dyn ModelClient) -> bool;
}
