// Aliyun DashScope multimodal embedding provider.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::core::provider_base::build_http_client;
use crate::ai::core::ModelClient;
use crate::database::models::ModelProvider;
use crate::error::{CoreError, CoreResult};

const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

#[derive(Debug, Clone)]
pub struct AliyunClient {
    client: Client,
    api_key: String,
    base_url: String,
    provider_id: Uuid,
    provider_name: String,
}

#[derive(Debug, Serialize)]
struct MultimodalRequest<'a> {
    model: &'a str,
    input: MultimodalInput,
}

#[derive(Debug, Serialize)]
struct MultimodalInput {
    contents: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MultimodalResponse {
    output: MultimodalOutput,
}

#[derive(Debug, Deserialize)]
struct MultimodalOutput {
    embeddings: Vec<MultimodalEmbedding>,
}

#[derive(Debug, Deserialize)]
struct MultimodalEmbedding {
    embedding: Vec<f32>,
}

impl AliyunClient {
    pub fn new(provider: &ModelProvider) -> CoreResult<Self> {
        Ok(Self {
            client: build_http_client(None)?,
            api_key: provider.api_key.clone().unwrap_or_default(),
            base_url: provider
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            provider_id: provider.id,
            provider_name: provider.name.clone(),
        })
    }

    fn embeddings_endpoint(&self) -> String {
        format!(
            "{}/services/embeddings/multimodal-embedding/multimodal-embedding",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ModelClient for AliyunClient {
    fn provider_id(&self) -> Uuid {
        self.provider_id
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn test_connection(&self) -> CoreResult<()> {
        // DashScope has no cheap liveness endpoint; a minimal text
        // embedding doubles as the connectivity probe.
        let model = "multimodal-embedding-one-peace-v1";
        self.embedding(None, Some("ping"), model).await.map(|_| ())
    }

    async fn embedding(
        &self,
        image: Option<&[u8]>,
        text: Option<&str>,
        model_name: &str,
    ) -> CoreResult<Vec<f32>> {
        let mut contents = Vec::new();
        if let Some(text) = text {
            contents.push(serde_json::json!({ "text": text }));
        }
        if let Some(image) = image {
            let data_url = format!(
                "data:image/jpeg;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(image)
            );
            contents.push(serde_json::json!({ "image": data_url }));
        }
        if contents.is_empty() {
            return Err(CoreError::Data("embedding request without input".into()));
        }

        let request = MultimodalRequest {
            model: model_name,
            input: MultimodalInput { contents },
        };
        let response = self
            .client
            .post(self.embeddings_endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "{} returned {}: {}",
                self.provider_name, status, body
            )));
        }

        let parsed: MultimodalResponse = response.json().await?;
        parsed
            .output
            .embeddings
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| {
                CoreError::Provider(format!("{} returned no embedding", self.provider_name))
            })
    }
}
