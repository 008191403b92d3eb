// Application state assembly: repositories, services, and background
// engines wired onto one shared pool.

use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;

use crate::ai::load_balancer::ModelLoadBalancer;
use crate::config::ConfigHandle;
use crate::database::queries::{
    EmbeddingRepo, ImageRepo, MigrationRepo, ProviderRepo, QueueRepo, SettingsRepo, TagRepo,
};
use crate::error::CoreResult;
use crate::notifications::{Notifier, WsNotifier};
use crate::scheduler::processors::{
    AestheticScoreProcessor, ImageEmbeddingProcessor, SmartAlbumProcessor, TagEmbeddingProcessor,
};
use crate::scheduler::smart_album::SmartAlbumService;
use crate::scheduler::{AiTaskScheduler, ProcessorRegistry};
use crate::services::{SearchService, SettingsService, TaggingService};
use crate::storage::{LocalStorage, MigrationEngine, StorageRegistry};

/// Extra storage backends, configured as a JSON list under the
/// `storage.backends` settings key.
#[derive(Debug, Deserialize)]
struct ExtraStorageConfig {
    id: String,
    path: String,
}

pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ConfigHandle>,
    pub balancer: Arc<ModelLoadBalancer>,
    pub notifier: Arc<WsNotifier>,
    pub storages: Arc<StorageRegistry>,
    pub scheduler: Arc<AiTaskScheduler>,
    pub migrations: Arc<MigrationEngine>,
    pub smart_albums: Arc<SmartAlbumService>,
    pub queues: QueueRepo,
    pub images: ImageRepo,
    pub tags: TagRepo,
    pub providers: ProviderRepo,
    pub search: SearchService,
    pub settings: SettingsService,
}

pub type SharedState = Arc<AppState>;

/// Build the full state graph and apply the persisted settings once so the
/// load balancer and config snapshot are live before anything starts.
pub async fn build_state(pool: PgPool) -> CoreResult<SharedState> {
    let queues = QueueRepo::new(pool.clone());
    let images = ImageRepo::new(pool.clone());
    let tags = TagRepo::new(pool.clone());
    let embeddings = EmbeddingRepo::new(pool.clone());
    let providers = ProviderRepo::new(pool.clone());
    let settings_repo = SettingsRepo::new(pool.clone());
    let migration_repo = MigrationRepo::new(pool.clone());

    let config = Arc::new(ConfigHandle::default());
    let balancer = Arc::new(ModelLoadBalancer::new());
    let notifier = Arc::new(WsNotifier::new());
    let notifier_dyn: Arc<dyn Notifier> = notifier.clone();

    let storages = Arc::new(StorageRegistry::new("local"));
    let library = LocalStorage::new("local", crate::global::get_app_data_dir().join("library"));
    library.initialize().await?;
    storages.register(Arc::new(library));
    register_extra_storages(&storages, &settings_repo).await?;

    let tagging = TaggingService::new(embeddings.clone(), tags.clone());

    let registry = Arc::new(ProcessorRegistry::new());
    registry.register(Arc::new(ImageEmbeddingProcessor::new(
        embeddings.clone(),
        images.clone(),
        storages.clone(),
        tagging.clone(),
        config.clone(),
    )));
    registry.register(Arc::new(AestheticScoreProcessor::new(
        images.clone(),
        storages.clone(),
    )));
    registry.register(Arc::new(TagEmbeddingProcessor::new(
        embeddings.clone(),
        tags.clone(),
    )));
    registry.register(Arc::new(SmartAlbumProcessor));

    let scheduler = Arc::new(AiTaskScheduler::new(
        queues.clone(),
        balancer.clone(),
        registry,
        notifier_dyn.clone(),
    ));
    let migrations = Arc::new(MigrationEngine::new(
        migration_repo,
        images.clone(),
        storages.clone(),
        notifier_dyn.clone(),
    ));
    let smart_albums = Arc::new(SmartAlbumService::new(
        embeddings.clone(),
        tags.clone(),
        balancer.clone(),
        notifier_dyn,
    ));

    let search = SearchService::new(embeddings, balancer.clone(), config.clone());
    let settings = SettingsService::new(
        settings_repo,
        providers.clone(),
        config.clone(),
        balancer.clone(),
    );
    settings.apply().await?;

    Ok(Arc::new(AppState {
        pool,
        config,
        balancer,
        notifier,
        storages,
        scheduler,
        migrations,
        smart_albums,
        queues,
        images,
        tags,
        providers,
        search,
        settings,
    }))
}

async fn register_extra_storages(
    storages: &Arc<StorageRegistry>,
    settings: &SettingsRepo,
) -> CoreResult<()> {
    let Some(raw) = settings.get("storage.backends").await? else {
        return Ok(());
    };
    let configs: Vec<ExtraStorageConfig> = match serde_json::from_str(&raw) {
        Ok(configs) => configs,
        Err(e) => {
            tracing::warn!("Ignoring unreadable storage.backends setting: {}", e);
            return Ok(());
        }
    };
    for config in configs {
        let backend = LocalStorage::new(config.id.clone(), config.path);
        backend.initialize().await?;
        storages.register(Arc::new(backend));
        tracing::info!("Registered storage backend '{}'", config.id);
    }
    Ok(())
}
