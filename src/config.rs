// Platform configuration snapshot backed by the settings table

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Process-wide snapshot of runtime tunables. Readers get an `Arc` clone of
/// the current snapshot; "apply settings" builds a fresh snapshot and swaps
/// it in, so readers never observe a half-updated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Default embedding model for semantic search
    pub search_model: String,
    /// Embedding model used for automatic tagging
    pub tag_model: String,
    /// Chat-completion model used for prompt optimisation and naming
    pub chat_model: String,
    /// System prompt for the prompt optimiser
    pub prompt_optimize_system: String,
    /// Whether freshly embedded images are tagged automatically
    pub auto_tag_enabled: bool,
    /// Similarity floor for tag matches
    pub tag_threshold: f32,
    /// Matches kept per subcategory during auto-tagging
    pub tag_top_k: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            search_model: String::new(),
            tag_model: String::new(),
            chat_model: String::new(),
            prompt_optimize_system: DEFAULT_PROMPT_OPTIMIZE_SYSTEM.to_string(),
            auto_tag_enabled: true,
            tag_threshold: 0.22,
            tag_top_k: 3,
        }
    }
}

const DEFAULT_PROMPT_OPTIMIZE_SYSTEM: &str = "You rewrite photo library search queries. \
Expand the user's query into a short, vivid description of the scene, keeping every \
constraint the user stated. Reply with the rewritten query only.";

pub const KEY_SEARCH_MODEL: &str = "ai.search_model";
pub const KEY_TAG_MODEL: &str = "ai.tag_model";
pub const KEY_CHAT_MODEL: &str = "ai.chat_model";
pub const KEY_PROMPT_OPTIMIZE_SYSTEM: &str = "ai.prompt_optimize_system";
pub const KEY_AUTO_TAG_ENABLED: &str = "ai.auto_tag_enabled";
pub const KEY_TAG_THRESHOLD: &str = "ai.tag_threshold";
pub const KEY_TAG_TOP_K: &str = "ai.tag_top_k";

impl PlatformConfig {
    /// Build a snapshot from raw settings rows, falling back to defaults for
    /// anything missing or unparseable.
    pub fn from_settings(values: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            search_model: values
                .get(KEY_SEARCH_MODEL)
                .cloned()
                .unwrap_or(defaults.search_model),
            tag_model: values
                .get(KEY_TAG_MODEL)
                .cloned()
                .unwrap_or(defaults.tag_model),
            chat_model: values
                .get(KEY_CHAT_MODEL)
                .cloned()
                .unwrap_or(defaults.chat_model),
            prompt_optimize_system: values
                .get(KEY_PROMPT_OPTIMIZE_SYSTEM)
                .cloned()
                .unwrap_or(defaults.prompt_optimize_system),
            auto_tag_enabled: values
                .get(KEY_AUTO_TAG_ENABLED)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_tag_enabled),
            tag_threshold: values
                .get(KEY_TAG_THRESHOLD)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tag_threshold),
            tag_top_k: values
                .get(KEY_TAG_TOP_K)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tag_top_k),
        }
    }
}

/// Copy-on-write handle to the current [`PlatformConfig`].
pub struct ConfigHandle {
    current: RwLock<Arc<PlatformConfig>>,
}

impl ConfigHandle {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Cheap read-side access: clones the `Arc`, never the snapshot.
    pub fn snapshot(&self) -> Arc<PlatformConfig> {
        self.current.read().clone()
    }

    /// Swap in a freshly built snapshot.
    pub fn swap(&self, config: PlatformConfig) {
        *self.current.write() = Arc::new(config);
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(PlatformConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_falls_back_to_defaults() {
        let mut values = HashMap::new();
        values.insert(KEY_SEARCH_MODEL.to_string(), "clip-vit-b32".to_string());
        values.insert(KEY_TAG_TOP_K.to_string(), "not-a-number".to_string());

        let config = PlatformConfig::from_settings(&values);
        assert_eq!(config.search_model, "clip-vit-b32");
        assert_eq!(config.tag_top_k, PlatformConfig::default().tag_top_k);
        assert!(config.auto_tag_enabled);
    }

    #[test]
    fn test_snapshot_swap_is_isolated() {
        let handle = ConfigHandle::default();
        let before = handle.snapshot();

        let mut updated = PlatformConfig::default();
        updated.search_model = "clip-vit-l14".to_string();
        handle.swap(updated);

        // The old snapshot is unchanged; new readers see the swap.
        assert_eq!(before.search_model, "");
        assert_eq!(handle.snapshot().search_model, "clip-vit-l14");
    }
}
