// Self-hosted inference sidecar: multimodal embeddings, combined
// embedding + aesthetic scoring, and a streaming clustering endpoint.

use async_trait::async_trait;
use base64::Engine;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ai::core::provider_base::build_http_client;
use crate::ai::core::{
    AestheticEmbedding, ClusterProgress, ClusterRequest, ClusterResult, ClusterStreaming,
    ModelClient,
};
use crate::database::models::ModelProvider;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct SelfHostedClient {
    client: Client,
    base_url: String,
    provider_id: Uuid,
    provider_name: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct AestheticsResponse {
    embedding: Vec<f32>,
    aesthetic_score: f32,
}

impl SelfHostedClient {
    pub fn new(provider: &ModelProvider) -> CoreResult<Self> {
        let base_url = provider.base_url.clone().ok_or_else(|| {
            CoreError::Config(format!(
                "self-hosted provider '{}' has no base URL",
                provider.name
            ))
        })?;
        Ok(Self {
            client: build_http_client(None)?,
            base_url,
            provider_id: provider.id,
            provider_name: provider.name.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(&self, response: reqwest::Response) -> CoreResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(CoreError::Provider(format!(
            "{} returned {}: {}",
            self.provider_name, status, body
        )))
    }
}

#[async_trait]
impl ModelClient for SelfHostedClient {
    fn provider_id(&self) -> Uuid {
        self.provider_id
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn test_connection(&self) -> CoreResult<()> {
        let response = self.client.get(self.endpoint("health")).send().await?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn embedding(
        &self,
        image: Option<&[u8]>,
        text: Option<&str>,
        model_name: &str,
    ) -> CoreResult<Vec<f32>> {
        if image.is_none() && text.is_none() {
            return Err(CoreError::Data("embedding request without input".into()));
        }
        let request = EmbedRequest {
            model: model_name,
            text,
            image_base64: image.map(|data| base64::engine::general_purpose::STANDARD.encode(data)),
        };
        let response = self
            .client
            .post(self.endpoint("embed"))
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let parsed: EmbedResponse = response.json().await?;
        Ok(parsed.embedding)
    }

    fn as_aesthetic(&self) -> Option<&dyn AestheticEmbedding> {
        Some(self)
    }

    fn as_clustering(&self) -> Option<&dyn ClusterStreaming> {
        Some(self)
    }
}

#[async_trait]
impl AestheticEmbedding for SelfHostedClient {
    async fn embedding_with_aesthetics(
        &self,
        image: &[u8],
        model_name: &str,
    ) -> CoreResult<(Vec<f32>, f32)> {
        let request = EmbedRequest {
            model: model_name,
            text: None,
            image_base64: Some(base64::engine::general_purpose::STANDARD.encode(image)),
        };
        let response = self
            .client
            .post(self.endpoint("embed_with_aesthetics"))
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let parsed: AestheticsResponse = response.json().await?;
        Ok((parsed.embedding, parsed.aesthetic_score))
    }
}

#[async_trait]
impl ClusterStreaming for SelfHostedClient {
    async fn cluster_stream(
        &self,
        request: ClusterRequest,
        progress: mpsc::Sender<ClusterProgress>,
    ) -> CoreResult<ClusterResult> {
        let response = self
            .client
            .post(self.endpoint("cluster"))
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;

        // The endpoint streams newline-delimited JSON progress frames; the
        // terminal frame carries the cluster result.
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut final_result: Option<ClusterResult> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let frame: ClusterProgress = serde_json::from_str(line).map_err(|e| {
                    CoreError::Provider(format!(
                        "{} sent an unreadable cluster frame: {}",
                        self.provider_name, e
                    ))
                })?;
                if let Some(result) = &frame.result {
                    final_result = Some(result.clone());
                }
                // Never block the stream on a slow progress consumer.
                let _ = progress.try_send(frame);
            }
        }

        final_result.ok_or_else(|| {
            CoreError::Provider(format!(
                "{} closed the cluster stream without a result",
                self.provider_name
            ))
        })
    }
}
