// Model load balancer: maps logical model names onto the configured
// provider instances and rotates between them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::ai::core::ModelClient;
use crate::ai::providers::create_client;
use crate::database::models::{ModelProvider, ProviderModelItem};
use crate::error::{CoreError, CoreResult};

/// One `(provider, model)` pairing a request can be dispatched to.
#[derive(Clone)]
pub struct ModelEndpoint {
    pub client: Arc<dyn ModelClient>,
    pub provider: Arc<ModelProvider>,
    pub model: ProviderModelItem,
}

struct ModelGroup {
    endpoints: Vec<ModelEndpoint>,
    cursor: AtomicUsize,
}

impl ModelGroup {
    /// Advance the round-robin cursor and return the starting index.
    /// A single endpoint short-circuits the counter entirely.
    fn next_start(&self) -> usize {
        let n = self.endpoints.len();
        if n <= 1 {
            0
        } else {
            self.cursor.fetch_add(1, Ordering::Relaxed) % n
        }
    }
}

#[derive(Default)]
struct Registry {
    by_model: HashMap<String, Arc<ModelGroup>>,
    by_provider: HashMap<Uuid, Arc<dyn ModelClient>>,
}

/// Registry + round-robin rotation over provider clients. Registration
/// swaps the whole index under a writer lock; selection on the hot path
/// only takes the read lock long enough to clone an `Arc`.
#[derive(Default)]
pub struct ModelLoadBalancer {
    registry: RwLock<Registry>,
}

impl ModelLoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the indices from the enabled provider rows. Providers whose
    /// client cannot be constructed are skipped and logged.
    pub fn register_models(&self, providers: &[ModelProvider]) {
        let mut by_model: HashMap<String, Vec<ModelEndpoint>> = HashMap::new();
        let mut by_provider: HashMap<Uuid, Arc<dyn ModelClient>> = HashMap::new();

        for provider in providers.iter().filter(|p| p.enabled) {
            let client = match create_client(provider) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!("Skipping provider '{}': {}", provider.name, e);
                    continue;
                }
            };
            by_provider.insert(provider.id, client.clone());

            let provider = Arc::new(provider.clone());
            for model in &provider.models {
                by_model
                    .entry(model.name.clone())
                    .or_default()
                    .push(ModelEndpoint {
                        client: client.clone(),
                        provider: provider.clone(),
                        model: model.clone(),
                    });
            }
        }

        let registry = Registry {
            by_model: by_model
                .into_iter()
                .map(|(name, endpoints)| {
                    (
                        name,
                        Arc::new(ModelGroup {
                            endpoints,
                            cursor: AtomicUsize::new(0),
                        }),
                    )
                })
                .collect(),
            by_provider,
        };

        *self.registry.write() = registry;
    }

    /// Direct lookup, used by "test this specific provider".
    pub fn client_by_id(&self, provider_id: Uuid) -> Option<Arc<dyn ModelClient>> {
        self.registry.read().by_provider.get(&provider_id).cloned()
    }

    /// Pick one endpoint for a model, round-robin among its providers.
    pub fn client_by_name(&self, model_name: &str) -> Option<ModelEndpoint> {
        let group = self.registry.read().by_model.get(model_name)?.clone();
        if group.endpoints.is_empty() {
            return None;
        }
        let start = group.next_start();
        Some(group.endpoints[start].clone())
    }

    /// Snapshot of every endpoint currently serving a model.
    pub fn endpoints_for(&self, model_name: &str) -> Vec<ModelEndpoint> {
        self.registry
            .read()
            .by_model
            .get(model_name)
            .map(|group| group.endpoints.clone())
            .unwrap_or_default()
    }

    /// Invoke `f` against each provider of the model in round-robin order,
    /// starting at the cursor, until one succeeds. Returns the last error
    /// when every provider fails; cancellation aborts the sequence.
    pub async fn try_all_providers<T, Fut, F>(&self, model_name: &str, mut f: F) -> CoreResult<T>
    where
        F: FnMut(ModelEndpoint) -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let group = self.registry.read().by_model.get(model_name).cloned();
        let Some(group) = group else {
            return Err(CoreError::Config(format!(
                "no enabled provider serves model '{}'",
                model_name
            )));
        };
        let n = group.endpoints.len();
        if n == 0 {
            return Err(CoreError::Config(format!(
                "no enabled provider serves model '{}'",
                model_name
            )));
        }

        let start = group.next_start();
        let mut last_error = None;
        for offset in 0..n {
            let endpoint = group.endpoints[(start + offset) % n].clone();
            let provider_name = endpoint.provider.name.clone();
            match f(endpoint).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_failover_candidate() => {
                    tracing::warn!(
                        "Provider '{}' failed for model '{}': {}",
                        provider_name,
                        model_name,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CoreError::Config(format!(
                "no enabled provider serves model '{}'",
                model_name
            ))
        }))
    }

    /// Distinct model names with at least one embedding-capable endpoint.
    pub fn all_embedding_models(&self) -> Vec<String> {
        self.models_where(|endpoint| {
            endpoint.model.supports_embedding && endpoint.client.supports_embedding()
        })
    }

    /// Distinct model names with at least one chat-capable endpoint.
    pub fn all_chat_completion_models(&self) -> Vec<String> {
        self.models_where(|endpoint| {
            endpoint.model.supports_chat_completion && endpoint.client.as_chat().is_some()
        })
    }

    fn models_where(&self, predicate: impl Fn(&ModelEndpoint) -> bool) -> Vec<String> {
        let registry = self.registry.read();
        let mut names: Vec<String> = registry
            .by_model
            .iter()
            .filter(|(_, group)| group.endpoints.iter().any(&predicate))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::ProviderKind;
    use chrono::Utc;

    fn provider(name: &str, models: Vec<ProviderModelItem>) -> ModelProvider {
        ModelProvider {
            id: Uuid::new_v4(),
            name: name.to_string(),
            provider_type: ProviderKind::OpenAi,
            api_key: Some("sk-test".to_string()),
            base_url: Some("http://127.0.0.1:9".to_string()),
            enabled: true,
            models,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn embedding_model(name: &str) -> ProviderModelItem {
        ProviderModelItem {
            name: name.to_string(),
            supports_embedding: true,
            supports_chat_completion: false,
        }
    }

    #[test]
    fn test_round_robin_rotation() {
        let balancer = ModelLoadBalancer::new();
        let a = provider("a", vec![embedding_model("modelA")]);
        let b = provider("b", vec![embedding_model("modelA")]);
        balancer.register_models(&[a.clone(), b.clone()]);

        let picks: Vec<Uuid> = (0..4)
            .map(|_| balancer.client_by_name("modelA").unwrap().provider.id)
            .collect();
        assert_eq!(picks[0], a.id);
        assert_eq!(picks[1], b.id);
        assert_eq!(picks[2], a.id);
        assert_eq!(picks[3], b.id);
    }

    #[test]
    fn test_disabled_providers_are_excluded() {
        let balancer = ModelLoadBalancer::new();
        let mut a = provider("a", vec![embedding_model("modelA")]);
        a.enabled = false;
        balancer.register_models(&[a]);

        assert!(balancer.client_by_name("modelA").is_none());
        assert!(balancer.all_embedding_models().is_empty());
    }

    #[tokio::test]
    async fn test_try_all_providers_fails_over_to_next() {
        let balancer = ModelLoadBalancer::new();
        let a = provider("a", vec![embedding_model("modelA")]);
        let b = provider("b", vec![embedding_model("modelA")]);
        balancer.register_models(&[a.clone(), b.clone()]);
        let failing = a.id;

        let winner = balancer
            .try_all_providers("modelA", |endpoint| {
                let id = endpoint.provider.id;
                async move {
                    if id == failing {
                        Err(CoreError::Provider("http 500".into()))
                    } else {
                        Ok(id)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(winner, b.id);
    }

    #[tokio::test]
    async fn test_try_all_providers_keeps_last_error() {
        let balancer = ModelLoadBalancer::new();
        let a = provider("a", vec![embedding_model("modelA")]);
        balancer.register_models(&[a]);

        let err = balancer
            .try_all_providers::<(), _, _>("modelA", |_| async {
                Err(CoreError::Provider("rate limited".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Provider(msg) if msg == "rate limited"));
    }

    #[tokio::test]
    async fn test_try_all_providers_starts_at_cursor() {
        let balancer = ModelLoadBalancer::new();
        let a = provider("a", vec![embedding_model("modelA")]);
        let b = provider("b", vec![embedding_model("modelA")]);
        balancer.register_models(&[a.clone(), b.clone()]);

        // First call starts at provider a, second at provider b.
        for expected in [a.id, b.id] {
            let first_tried = balancer
                .try_all_providers("modelA", |endpoint| {
                    let id = endpoint.provider.id;
                    async move { Ok::<_, CoreError>(id) }
                })
                .await
                .unwrap();
            assert_eq!(first_tried, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_model_is_a_config_error() {
        let balancer = ModelLoadBalancer::new();
        let err = balancer
            .try_all_providers::<(), _, _>("missing", |_| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_capability_filtered_inventories() {
        let balancer = ModelLoadBalancer::new();
        let chat_model = ProviderModelItem {
            name: "gpt-4o-mini".to_string(),
            supports_embedding: false,
            supports_chat_completion: true,
        };
        let a = provider("a", vec![embedding_model("modelA"), chat_model]);
        balancer.register_models(&[a]);

        assert_eq!(balancer.all_embedding_models(), vec!["modelA"]);
        assert_eq!(balancer.all_chat_completion_models(), vec!["gpt-4o-mini"]);
    }
}
