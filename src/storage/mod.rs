// Pluggable blob storage: a backend trait, a registry resolving storage
// ids, and the migration engine that moves files between backends.

pub mod local;
pub mod migration;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};

pub use local::LocalStorage;
pub use migration::MigrationEngine;

/// A blob store holding originals or thumbnails under relative paths.
#[async_trait]
pub trait Storage: Send + Sync {
    fn id(&self) -> &str;

    /// Write a blob, creating parent directories as needed. Returns the
    /// path the blob is reachable under.
    async fn upload(&self, data: &[u8], rel_path: &str) -> CoreResult<String>;

    async fn download(&self, rel_path: &str) -> CoreResult<Vec<u8>>;

    async fn delete(&self, rel_path: &str) -> CoreResult<()>;

    /// Relocate a whole subtree, for library re-rooting.
    async fn move_base(&self, old_base: &str, new_base: &str) -> CoreResult<()>;
}

/// Maps storage ids to backends. Callers name the backend per call; the
/// default id covers paths that do not.
pub struct StorageRegistry {
    backends: RwLock<HashMap<String, Arc<dyn Storage>>>,
    default_id: RwLock<String>,
}

impl StorageRegistry {
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            default_id: RwLock::new(default_id.into()),
        }
    }

    pub fn register(&self, backend: Arc<dyn Storage>) {
        self.backends
            .write()
            .insert(backend.id().to_string(), backend);
    }

    pub fn get(&self, storage_id: &str) -> CoreResult<Arc<dyn Storage>> {
        self.backends
            .read()
            .get(storage_id)
            .cloned()
            .ok_or_else(|| CoreError::Config(format!("unknown storage backend '{}'", storage_id)))
    }

    pub fn default_backend(&self) -> CoreResult<Arc<dyn Storage>> {
        let id = self.default_id.read().clone();
        self.get(&id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_registry_resolves_registered_backends() {
        let temp = TempDir::new().unwrap();
        let registry = StorageRegistry::new("local");
        registry.register(Arc::new(LocalStorage::new("local", temp.path())));

        assert!(registry.get("local").is_ok());
        assert!(registry.default_backend().is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(CoreError::Config(_))
        ));
        assert_eq!(registry.ids(), vec!["local"]);
    }
}
