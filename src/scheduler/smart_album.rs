// Smart-album clustering task. Exactly one task may be non-terminal at a
// time; everything lives in memory and does not survive a restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::ai::core::{ClusterItem, ClusterRequest, ClusterUmapParams};
use crate::ai::load_balancer::ModelLoadBalancer;
use crate::database::models::SmartAlbumParams;
use crate::database::queries::{EmbeddingRepo, TagRepo};
use crate::error::{CoreError, CoreResult};
use crate::notifications::Notifier;

/// Rejection message when the single slot is occupied.
pub const TASK_BUSY_ERROR: &str = "已有任务正在执行中";

/// Smart albums are named `智能相册 #N`, N strictly increasing.
pub const ALBUM_NAME_PREFIX: &str = "智能相册 #";

/// Buffered frames between the RPC reader and the task updater.
const PROGRESS_CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmartAlbumStatus {
    Pending,
    Collecting,
    Clustering,
    Creating,
    Completed,
    Failed,
}

impl SmartAlbumStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SmartAlbumStatus::Completed | SmartAlbumStatus::Failed)
    }
}

/// Progress snapshot pushed to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct SmartAlbumStatusView {
    pub id: u64,
    pub model_name: String,
    pub status: SmartAlbumStatus,
    pub progress: i32,
    pub message: String,
    pub error: Option<String>,
    pub album_ids: Vec<i64>,
}

struct TaskState {
    id: u64,
    model_name: String,
    status: SmartAlbumStatus,
    progress: i32,
    message: String,
    error: Option<String>,
    album_ids: Vec<i64>,
}

impl TaskState {
    fn new(id: u64, model_name: String) -> Self {
        Self {
            id,
            model_name,
            status: SmartAlbumStatus::Pending,
            progress: 0,
            message: String::new(),
            error: None,
            album_ids: Vec::new(),
        }
    }

    fn view(&self) -> SmartAlbumStatusView {
        SmartAlbumStatusView {
            id: self.id,
            model_name: self.model_name.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            error: self.error.clone(),
            album_ids: self.album_ids.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SmartAlbumService {
    slot: Arc<Mutex<Option<TaskState>>>,
    counter: Arc<AtomicU64>,
    embeddings: EmbeddingRepo,
    tags: TagRepo,
    balancer: Arc<ModelLoadBalancer>,
    notifier: Arc<dyn Notifier>,
}

impl SmartAlbumService {
    pub fn new(
        embeddings: EmbeddingRepo,
        tags: TagRepo,
        balancer: Arc<ModelLoadBalancer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            counter: Arc::new(AtomicU64::new(0)),
            embeddings,
            tags,
            balancer,
            notifier,
        }
    }

    /// Claim the slot and launch the pipeline. Rejected while an earlier
    /// task is still non-terminal; the running task is never cancelled by a
    /// new submission.
    pub fn submit(&self, params: SmartAlbumParams) -> CoreResult<SmartAlbumStatusView> {
        let view = {
            let mut slot = self.slot.lock();
            if let Some(task) = slot.as_ref() {
                if !task.status.is_terminal() {
                    return Err(CoreError::Config(TASK_BUSY_ERROR.to_string()));
                }
            }
            let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let state = TaskState::new(id, params.model_name.clone());
            let view = state.view();
            *slot = Some(state);
            view
        };
        self.notifier.notify_smart_album_progress(view.clone());

        let service = self.clone();
        let task_id = view.id;
        tokio::spawn(async move {
            let outcome = std::panic::AssertUnwindSafe(service.run(task_id, params))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => service.fail(task_id, &e.to_string()),
                Err(_) => service.fail(task_id, "smart album task panicked"),
            }
        });

        Ok(view)
    }

    pub fn current_status(&self) -> Option<SmartAlbumStatusView> {
        self.slot.lock().as_ref().map(|task| task.view())
    }

    /// Mutate the task under the lock, release, then push. A slow notifier
    /// must not block the clustering stream.
    fn update(&self, task_id: u64, f: impl FnOnce(&mut TaskState)) {
        let view = {
            let mut slot = self.slot.lock();
            match slot.as_mut() {
                Some(task) if task.id == task_id => {
                    f(task);
                    Some(task.view())
                }
                _ => None,
            }
        };
        if let Some(view) = view {
            self.notifier.notify_smart_album_progress(view);
        }
    }

    fn fail(&self, task_id: u64, error: &str) {
        tracing::error!("Smart album task {} failed: {}", task_id, error);
        let error = error.to_string();
        self.update(task_id, |task| {
            task.status = SmartAlbumStatus::Failed;
            task.error = Some(error);
        });
    }

    async fn run(&self, task_id: u64, params: SmartAlbumParams) -> CoreResult<()> {
        // Collecting: load every embedding of the requested model.
        self.update(task_id, |task| {
            task.status = SmartAlbumStatus::Collecting;
            task.progress = 5;
            task.message = "Collecting image embeddings".to_string();
        });
        let vectors = self
            .embeddings
            .embeddings_for_model(&params.model_name)
            .await?;
        if vectors.is_empty() {
            return Err(CoreError::Data(format!(
                "no embeddings stored for model '{}'",
                params.model_name
            )));
        }
        self.update(task_id, |task| {
            task.progress = 20;
            task.message = format!("Collected {} embeddings", vectors.len());
        });

        // Clustering: stream progress frames, remapping the endpoint's
        // native 0-100 into the 25-80 window.
        self.update(task_id, |task| {
            task.status = SmartAlbumStatus::Clustering;
            task.progress = 25;
            task.message = "Clustering".to_string();
        });

        let request = ClusterRequest {
            model_name: params.model_name.clone(),
            items: vectors
                .into_iter()
                .map(|e| ClusterItem {
                    id: e.image_id,
                    vector: e.embedding,
                })
                .collect(),
            min_cluster_size: params.min_cluster_size,
            min_samples: params.min_samples,
            umap: params.umap.as_ref().map(|u| ClusterUmapParams {
                n_components: u.n_components,
                n_neighbors: u.n_neighbors,
            }),
        };

        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        // The stream runs in its own task so every sender is gone once it
        // finishes; the drain loop below ends on channel close.
        let cluster = tokio::spawn({
            let balancer = self.balancer.clone();
            let model_name = params.model_name.clone();
            async move {
                balancer
                    .try_all_providers(&model_name, |endpoint| {
                        let request = request.clone();
                        let progress_tx = progress_tx.clone();
                        async move {
                            match endpoint.client.as_clustering() {
                                Some(clustering) => {
                                    clustering.cluster_stream(request, progress_tx).await
                                }
                                None => Err(CoreError::CapabilityMismatch {
                                    model: endpoint.model.name.clone(),
                                    capability: "clustering",
                                }),
                            }
                        }
                    })
                    .await
            }
        });

        while let Some(frame) = progress_rx.recv().await {
            let progress = remap_cluster_progress(frame.progress);
            self.update(task_id, |task| {
                task.progress = progress;
                if !frame.message.is_empty() {
                    task.message = frame.message.clone();
                }
            });
        }
        let result = cluster
            .await
            .map_err(|e| CoreError::Invariant(format!("clustering task aborted: {}", e)))??;

        // Creating: one album tag per non-empty cluster.
        self.update(task_id, |task| {
            task.status = SmartAlbumStatus::Creating;
            task.progress = 80;
            task.message = "Creating albums".to_string();
        });

        let existing = self.tags.smart_album_names().await?;
        let mut next_number = next_album_number(&existing);
        let mut album_ids = Vec::new();
        for cluster in result.clusters.iter().filter(|c| !c.is_empty()) {
            let name = format!("{}{}", ALBUM_NAME_PREFIX, next_number);
            next_number += 1;
            let cover = cluster.first().copied();
            let album = self.tags.create_album(&name, cover, true).await?;
            self.tags.attach_images(album.id, cluster).await?;
            album_ids.push(album.id);
        }
        tracing::info!(
            "Smart album task {} created {} album(s)",
            task_id,
            album_ids.len()
        );

        self.update(task_id, |task| {
            task.status = SmartAlbumStatus::Completed;
            task.progress = 100;
            task.message = format!("Created {} albums", album_ids.len());
            task.album_ids = album_ids.clone();
        });
        Ok(())
    }
}

/// Remap the clustering endpoint's native 0-100 progress into the 25-80
/// window the overall pipeline reserves for it.
pub fn remap_cluster_progress(native: i32) -> i32 {
    let clamped = native.clamp(0, 100);
    25 + clamped * 55 / 100
}

static ALBUM_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"智能相册 #(\d+)").expect("album suffix pattern is valid"));

/// Next album number: one past the highest numeric suffix among existing
/// smart albums.
pub fn next_album_number(existing_names: &[String]) -> u64 {
    existing_names
        .iter()
        .filter_map(|name| ALBUM_SUFFIX.captures(name))
        .filter_map(|captures| captures[1].parse::<u64>().ok())
        .max()
        .map(|max| max + 1)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_cluster_progress_window() {
        assert_eq!(remap_cluster_progress(0), 25);
        assert_eq!(remap_cluster_progress(100), 80);
        assert_eq!(remap_cluster_progress(50), 52);
        // Out-of-range native values are clamped into the window.
        assert_eq!(remap_cluster_progress(-10), 25);
        assert_eq!(remap_cluster_progress(250), 80);
    }

    #[test]
    fn test_next_album_number_continues_the_sequence() {
        let names = vec![
            "智能相册 #1".to_string(),
            "智能相册 #7".to_string(),
            "海边旅行".to_string(),
            "智能相册 #3".to_string(),
        ];
        assert_eq!(next_album_number(&names), 8);
    }

    #[test]
    fn test_next_album_number_starts_at_one() {
        assert_eq!(next_album_number(&[]), 1);
        assert_eq!(next_album_number(&["假期".to_string()]), 1);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SmartAlbumStatus::Completed.is_terminal());
        assert!(SmartAlbumStatus::Failed.is_terminal());
        assert!(!SmartAlbumStatus::Clustering.is_terminal());
        assert!(!SmartAlbumStatus::Pending.is_terminal());
    }
}
