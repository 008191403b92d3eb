// Storage migration engine: moves originals or thumbnails between
// backends with per-file status tracking, pause/resume, and retry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::database::models::{
    FileRecordStatus, Image, MigrationFileRecord, MigrationStatus, MigrationTask,
    MigrationTaskView, MigrationType,
};
use crate::database::queries::{ImageRepo, MigrationRepo, MigrationWorkUnit};
use crate::error::{CoreError, CoreResult};
use crate::notifications::Notifier;

use super::StorageRegistry;

const RESERVE_BATCH: i64 = 100;
const WORKER_COUNT: usize = 5;
const CHANNEL_CAPACITY: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMigrationRequest {
    pub migration_type: MigrationType,
    pub source_storage_id: String,
    pub target_storage_id: String,
    #[serde(default)]
    pub delete_source: bool,
}

#[derive(Clone)]
pub struct MigrationEngine {
    repo: MigrationRepo,
    images: ImageRepo,
    storages: Arc<StorageRegistry>,
    notifier: Arc<dyn Notifier>,
    cancels: Arc<Mutex<HashMap<Uuid, watch::Sender<bool>>>>,
}

impl MigrationEngine {
    pub fn new(
        repo: MigrationRepo,
        images: ImageRepo,
        storages: Arc<StorageRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            images,
            storages,
            notifier,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn validate(&self, request: &CreateMigrationRequest) -> CoreResult<()> {
        if request.source_storage_id == request.target_storage_id {
            return Err(CoreError::Config(
                "source and target storage are the same".into(),
            ));
        }
        self.storages.get(&request.source_storage_id)?;
        self.storages.get(&request.target_storage_id)?;
        Ok(())
    }

    /// Create the task with one file record per matching image and launch
    /// the executor.
    pub async fn create(
        &self,
        request: CreateMigrationRequest,
    ) -> CoreResult<MigrationTaskView> {
        self.validate(&request)?;

        let task = self
            .repo
            .create_task(
                request.migration_type,
                &request.source_storage_id,
                &request.target_storage_id,
                request.delete_source,
            )
            .await?;
        tracing::info!(
            "Created {} migration {} ({} files, {} -> {})",
            task.migration_type.as_str(),
            task.id,
            task.total_files,
            task.source_storage_id,
            task.target_storage_id
        );

        let view = self
            .repo
            .view(task.id)
            .await?
            .ok_or_else(|| CoreError::Invariant("migration task vanished after insert".into()))?;
        self.notify_snapshot().await;
        self.spawn_executor(task.id);
        Ok(view)
    }

    /// Count + sample of the files a request would touch, without creating
    /// any records.
    pub async fn preview(
        &self,
        request: &CreateMigrationRequest,
    ) -> CoreResult<(i64, Vec<Image>)> {
        self.validate(request)?;
        self.repo
            .preview(request.migration_type, &request.source_storage_id)
            .await
    }

    pub async fn list(&self) -> CoreResult<Vec<MigrationTaskView>> {
        self.repo.list_views().await
    }

    pub async fn failed_files(&self, task_id: Uuid) -> CoreResult<Vec<MigrationFileRecord>> {
        self.repo.failed_records(task_id).await
    }

    /// Cancel the executor cooperatively and park the task.
    pub async fn pause(&self, task_id: Uuid) -> CoreResult<()> {
        let task = self.require_task(task_id).await?;
        if task.status != MigrationStatus::Running && task.status != MigrationStatus::Pending {
            return Err(CoreError::Config(format!(
                "migration in state '{}' cannot be paused",
                task.status.as_str()
            )));
        }
        self.cancel_executor(task_id);
        self.repo
            .set_status(task_id, MigrationStatus::Paused, None)
            .await?;
        self.notify_snapshot().await;
        Ok(())
    }

    /// Relaunch a paused task. The executor resets orphaned in_progress
    /// records before any worker starts.
    pub async fn resume(&self, task_id: Uuid) -> CoreResult<()> {
        let task = self.require_task(task_id).await?;
        if task.status != MigrationStatus::Paused {
            return Err(CoreError::Config(format!(
                "migration in state '{}' cannot be resumed",
                task.status.as_str()
            )));
        }
        self.spawn_executor(task_id);
        Ok(())
    }

    /// Reset failed (and orphaned in_progress) records to pending and run
    /// the task again.
    pub async fn retry_failed(&self, task_id: Uuid) -> CoreResult<()> {
        let task = self.require_task(task_id).await?;
        if task.status != MigrationStatus::Failed {
            return Err(CoreError::Config(format!(
                "migration in state '{}' has nothing to retry",
                task.status.as_str()
            )));
        }
        let reset = self.repo.reset_incomplete_records(task_id).await?;
        tracing::info!("Reset {} file records for migration {}", reset, task_id);
        self.repo
            .set_status(task_id, MigrationStatus::Pending, None)
            .await?;
        self.notify_snapshot().await;
        self.spawn_executor(task_id);
        Ok(())
    }

    /// Drop the task and all its records. A running executor is cancelled
    /// first.
    pub async fn dismiss(&self, task_id: Uuid) -> CoreResult<()> {
        self.require_task(task_id).await?;
        self.cancel_executor(task_id);
        self.repo.delete_task(task_id).await?;
        self.notify_snapshot().await;
        Ok(())
    }

    async fn require_task(&self, task_id: Uuid) -> CoreResult<MigrationTask> {
        self.repo
            .get(task_id)
            .await?
            .ok_or_else(|| CoreError::Data(format!("migration task {} not found", task_id)))
    }

    fn cancel_executor(&self, task_id: Uuid) {
        if let Some(cancel) = self.cancels.lock().get(&task_id) {
            let _ = cancel.send(true);
        }
    }

    fn spawn_executor(&self, task_id: Uuid) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancels.lock().insert(task_id, cancel_tx);

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run(task_id, cancel_rx).await {
                tracing::error!("Migration {} executor failed: {}", task_id, e);
                let _ = engine
                    .repo
                    .set_status(task_id, MigrationStatus::Failed, Some(&e.to_string()))
                    .await;
            }
            engine.cancels.lock().remove(&task_id);
            engine.notify_snapshot().await;
        });
    }

    async fn run(&self, task_id: Uuid, cancel: watch::Receiver<bool>) -> CoreResult<()> {
        let Some(task) = self.repo.get(task_id).await? else {
            return Ok(());
        };

        // Heal reservations orphaned by a pause or crash before any worker
        // can pick up work.
        self.repo.reset_in_progress_records(task_id).await?;
        self.repo
            .set_status(task_id, MigrationStatus::Running, None)
            .await?;
        self.notify_snapshot().await;

        let (tx, rx) = flume::bounded::<MigrationWorkUnit>(CHANNEL_CAPACITY);

        let producer = {
            let engine = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    if *cancel.borrow() {
                        break;
                    }
                    let units = match engine.repo.reserve_pending(task_id, RESERVE_BATCH).await {
                        Ok(units) => units,
                        Err(e) => {
                            tracing::error!(
                                "Migration {} failed to reserve file records: {}",
                                task_id,
                                e
                            );
                            break;
                        }
                    };
                    if units.is_empty() {
                        break;
                    }
                    for unit in units {
                        if tx.send_async(unit).await.is_err() {
                            return;
                        }
                    }
                }
            })
        };

        let task = Arc::new(task);
        let mut workers = Vec::with_capacity(WORKER_COUNT);
        for _ in 0..WORKER_COUNT {
            let engine = self.clone();
            let rx = rx.clone();
            let cancel = cancel.clone();
            let task = task.clone();
            workers.push(tokio::spawn(async move {
                while let Ok(unit) = rx.recv_async().await {
                    if *cancel.borrow() {
                        break;
                    }
                    engine.migrate_file(&task, unit).await;
                }
            }));
        }
        drop(rx);

        let _ = producer.await;
        for worker in workers {
            let _ = worker.await;
        }

        // Finalisation. Pause and dismissal flip the status away from
        // running; in that case the state is left alone.
        let Some(current) = self.repo.get(task_id).await? else {
            return Ok(());
        };
        if current.status == MigrationStatus::Running {
            let counts = self.repo.counts(task_id).await?;
            if counts.failed > 0 {
                self.repo
                    .set_status(
                        task_id,
                        MigrationStatus::Failed,
                        Some(&format!("{} file(s) failed to migrate", counts.failed)),
                    )
                    .await?;
                tracing::warn!(
                    "Migration {} finished with {} failed file(s)",
                    task_id,
                    counts.failed
                );
            } else {
                // The happy path is self-cleaning.
                self.repo.delete_task(task_id).await?;
                tracing::info!("Migration {} completed, records removed", task_id);
            }
        }
        self.notify_snapshot().await;
        Ok(())
    }

    async fn migrate_file(&self, task: &MigrationTask, unit: MigrationWorkUnit) {
        let record_id = unit.record.id;
        match self.migrate_file_inner(task, &unit.image).await {
            Ok(()) => {
                if let Err(e) = self
                    .repo
                    .mark_record(record_id, FileRecordStatus::Success, None)
                    .await
                {
                    tracing::error!("Failed to mark record {} as success: {}", record_id, e);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Migration {} failed for image {}: {}",
                    task.id,
                    unit.image.id,
                    e
                );
                if let Err(mark_err) = self
                    .repo
                    .mark_record(record_id, FileRecordStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    tracing::error!("Failed to mark record {} as failed: {}", record_id, mark_err);
                }
            }
        }
        self.notify_snapshot().await;
    }

    async fn migrate_file_inner(&self, task: &MigrationTask, image: &Image) -> CoreResult<()> {
        let (rel_path, record_storage_id) = match task.migration_type {
            MigrationType::Original => (image.relative_path.clone(), image.storage_id.clone()),
            MigrationType::Thumbnail => (
                image
                    .thumbnail_path
                    .clone()
                    .ok_or_else(|| CoreError::Data(format!("image {} has no thumbnail", image.id)))?,
                image.thumbnail_storage_id.clone(),
            ),
        };

        // The image moved elsewhere since the records were created; the row
        // is stale and counts as done.
        if record_storage_id != task.source_storage_id {
            return Ok(());
        }

        let source = self.storages.get(&task.source_storage_id)?;
        let target = self.storages.get(&task.target_storage_id)?;

        let data = source.download(&rel_path).await?;
        target.upload(&data, &rel_path).await?;

        match task.migration_type {
            MigrationType::Original => {
                self.images
                    .set_storage_id(image.id, &task.target_storage_id)
                    .await?
            }
            MigrationType::Thumbnail => {
                self.images
                    .set_thumbnail_storage_id(image.id, &task.target_storage_id)
                    .await?
            }
        }

        if task.delete_source {
            // Best-effort: a leftover source blob never fails the record.
            if let Err(e) = source.delete(&rel_path).await {
                tracing::warn!("Failed to delete source blob '{}': {}", rel_path, e);
            }
        }

        Ok(())
    }

    async fn notify_snapshot(&self) {
        match self.repo.list_views().await {
            Ok(views) => self.notifier.notify_migration_progress(views),
            Err(e) => tracing::error!("Failed to load migration snapshot: {}", e),
        }
    }
}
