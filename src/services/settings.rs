// Settings service: the single entry point that turns settings writes into
// a fresh config snapshot and a rebuilt model registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ai::load_balancer::ModelLoadBalancer;
use crate::config::{ConfigHandle, PlatformConfig};
use crate::database::queries::{ProviderRepo, SettingsRepo};
use crate::error::CoreResult;

#[derive(Clone)]
pub struct SettingsService {
    settings: SettingsRepo,
    providers: ProviderRepo,
    config: Arc<ConfigHandle>,
    balancer: Arc<ModelLoadBalancer>,
}

impl SettingsService {
    pub fn new(
        settings: SettingsRepo,
        providers: ProviderRepo,
        config: Arc<ConfigHandle>,
        balancer: Arc<ModelLoadBalancer>,
    ) -> Self {
        Self {
            settings,
            providers,
            config,
            balancer,
        }
    }

    /// Rebuild the config snapshot and the provider registry from what is
    /// currently persisted. Called at startup and after every settings or
    /// provider change.
    pub async fn apply(&self) -> CoreResult<()> {
        let values = self.settings.all().await?;
        self.config.swap(PlatformConfig::from_settings(&values));

        let providers = self.providers.list_enabled().await?;
        self.balancer.register_models(&providers);
        tracing::info!(
            "Applied settings: {} enabled provider(s), {} embedding model(s)",
            providers.len(),
            self.balancer.all_embedding_models().len()
        );
        Ok(())
    }

    pub async fn get_all(&self) -> CoreResult<HashMap<String, String>> {
        self.settings.all().await
    }

    /// Persist a batch of settings and re-apply.
    pub async fn update(&self, entries: HashMap<String, String>) -> CoreResult<()> {
        for (key, value) in &entries {
            self.settings.set(key, value).await?;
        }
        self.apply().await
    }
}
