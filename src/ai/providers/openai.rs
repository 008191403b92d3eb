// OpenAI-compatible provider: text embeddings and chat completions against
// any endpoint speaking the /v1 API shape.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::core::provider_base::build_http_client;
use crate::ai::core::{ChatCompletion, ChatMessage, ModelClient};
use crate::database::models::ModelProvider;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    provider_id: Uuid,
    provider_name: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(provider: &ModelProvider) -> CoreResult<Self> {
        let base_url = provider
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(Self {
            client: build_http_client(None)?,
            api_key: provider.api_key.clone().unwrap_or_default(),
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
impl ModelClient for OpenAiClient {
    fn provider_id(&self) -> Uuid {
        self.provider_id
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn test_connection(&self) -> CoreResult<()> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn embedding(
        &self,
        image: Option<&[u8]>,
        text: Option<&str>,
        model_name: &str,
    ) -> CoreResult<Vec<f32>> {
        // The /v1 embeddings API is text-only.
        if image.is_some() {
            return Err(CoreError::CapabilityMismatch {
                model: model_name.to_string(),
                capability: "image embedding",
            });
        }
        let Some(text) = text else {
            return Err(CoreError::Data("embedding request without input".into()));
        };

        let request = EmbeddingsRequest {
            model: model_name,
            input: vec![text],
        };
        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let parsed: EmbeddingsResponse = response.json().await?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                CoreError::Provider(format!("{} returned no embedding", self.provider_name))
            })
    }

    fn as_chat(&self) -> Option<&dyn ChatCompletion> {
        Some(self)
    }
}

#[async_trait]
impl ChatCompletion for OpenAiClient {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model_name: &str,
    ) -> CoreResult<String> {
        let request = ChatRequest {
            model: model_name,
            messages,
        };
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let parsed: ChatResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                CoreError::Provider(format!("{} returned no completion", self.provider_name))
            })
    }
}
