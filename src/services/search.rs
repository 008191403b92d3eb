// Semantic search over stored image embeddings + prompt optimisation.

use std::sync::Arc;

use crate::ai::core::ChatMessage;
use crate::ai::load_balancer::ModelLoadBalancer;
use crate::config::ConfigHandle;
use crate::database::queries::{EmbeddingRepo, ScoredImage};
use crate::error::{CoreError, CoreResult};

#[derive(Clone)]
pub struct SearchService {
    embeddings: EmbeddingRepo,
    balancer: Arc<ModelLoadBalancer>,
    config: Arc<ConfigHandle>,
}

impl SearchService {
    pub fn new(
        embeddings: EmbeddingRepo,
        balancer: Arc<ModelLoadBalancer>,
        config: Arc<ConfigHandle>,
    ) -> Self {
        Self {
            embeddings,
            balancer,
            config,
        }
    }

    /// Embed the query (image and/or text) and rank images by cosine
    /// distance ascending. `Some(&[])` candidates means the empty result;
    /// `None` searches the whole library.
    pub async fn semantic_search_within_ids(
        &self,
        image: Option<Vec<u8>>,
        text: Option<String>,
        model_name: Option<String>,
        candidate_ids: Option<Vec<i64>>,
        limit: i64,
    ) -> CoreResult<Vec<ScoredImage>> {
        if let Some(ids) = &candidate_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }
        if image.is_none() && text.is_none() {
            return Err(CoreError::Data("search request without input".into()));
        }

        let model_name = match model_name.filter(|m| !m.is_empty()) {
            Some(model) => model,
            None => {
                let config = self.config.snapshot();
                if config.search_model.is_empty() {
                    return Err(CoreError::Config("no search model configured".into()));
                }
                config.search_model.clone()
            }
        };

        let query = self
            .balancer
            .try_all_providers(&model_name, |endpoint| {
                let image = image.clone();
                let text = text.clone();
                async move {
                    endpoint
                        .client
                        .embedding(image.as_deref(), text.as_deref(), &endpoint.model.name)
                        .await
                }
            })
            .await?;

        self.embeddings
            .search_images(&model_name, &query, candidate_ids.as_deref(), limit)
            .await
    }

    /// Rewrite a search query through the configured chat model.
    pub async fn optimize_prompt(&self, query: &str) -> CoreResult<String> {
        let config = self.config.snapshot();
        if config.chat_model.is_empty() {
            return Err(CoreError::Config("no chat model configured".into()));
        }

        let messages = vec![
            ChatMessage::system(config.prompt_optimize_system.clone()),
            ChatMessage::user(query),
        ];

        self.balancer
            .try_all_providers(&config.chat_model, |endpoint| {
                let messages = messages.clone();
                async move {
                    match endpoint.client.as_chat() {
                        Some(chat) => chat.chat_completion(&messages, &endpoint.model.name).await,
                        None => Err(CoreError::CapabilityMismatch {
                            model: endpoint.model.name.clone(),
                            capability: "chat completion",
                        }),
                    }
                }
            })
            .await
    }
}
