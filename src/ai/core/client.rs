// Provider-agnostic model client abstraction.
//
// Every provider implements the required [`ModelClient`] surface; optional
// capabilities (chat completion, aesthetic embedding, clustering) are their
// own traits, reachable through accessors so dispatch sites can test for the
// capability instead of trusting a boolean flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One embedding row handed to the clustering endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterItem {
    pub id: i64,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterUmapParams {
    pub n_components: usize,
    pub n_neighbors: usize,
}

/// Parameters forwarded verbatim to the self-hosted clustering service
/// (HDBSCAN with an optional UMAP reduction in front).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub model_name: String,
    pub items: Vec<ClusterItem>,
    pub min_cluster_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umap: Option<ClusterUmapParams>,
}

/// Grouped item ids, one inner list per cluster. Noise points are absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterResult {
    pub clusters: Vec<Vec<i64>>,
}

/// One progress frame from the clustering stream. The terminal frame
/// carries the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterProgress {
    pub progress: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Option<ClusterResult>,
}

/// Required surface of every provider client.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Id of the provider row this client was built from.
    fn provider_id(&self) -> Uuid;

    /// Human-readable provider name for error messages.
    fn provider_name(&self) -> &str;

    async fn test_connection(&self) -> CoreResult<()>;

    /// Embed an image, a text, or both. Providers that cannot serve the
    /// requested combination return a capability error, which the load
    /// balancer treats like any other provider failure.
    async fn embedding(
        &self,
        image: Option<&[u8]>,
        text: Option<&str>,
        model_name: &str,
    ) -> CoreResult<Vec<f32>>;

    fn supports_embedding(&self) -> bool {
        true
    }

    fn supports_chat_completion(&self) -> bool {
        self.as_chat().is_some()
    }

    /// Optional chat-completion capability.
    fn as_chat(&self) -> Option<&dyn ChatCompletion> {
        None
    }

    /// Optional combined embedding + aesthetic scoring capability.
    fn as_aesthetic(&self) -> Option<&dyn AestheticEmbedding> {
        None
    }

    /// Optional streaming clustering capability.
    fn as_clustering(&self) -> Option<&dyn ClusterStreaming> {
        None
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model_name: &str,
    ) -> CoreResult<String>;
}

#[async_trait]
pub trait AestheticEmbedding: Send + Sync {
    /// Embed an image and score its aesthetics in one call.
    async fn embedding_with_aesthetics(
        &self,
        image: &[u8],
        model_name: &str,
    ) -> CoreResult<(Vec<f32>, f32)>;
}

#[async_trait]
pub trait ClusterStreaming: Send + Sync {
    /// Run a clustering job, forwarding progress frames into `progress` as
    /// they arrive. Returns the final result; the send side is dropped when
    /// the stream ends.
    async fn cluster_stream(
        &self,
        request: ClusterRequest,
        progress: mpsc::Sender<ClusterProgress>,
    ) -> CoreResult<ClusterResult>;
}
