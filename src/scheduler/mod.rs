// AI task scheduler: a producer loop that discovers work and keeps the
// queue set in sync with the live model inventory, and a consumer loop
// that drains one queue per tick through the load balancer.

pub mod processors;
pub mod registry;
pub mod smart_album;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::ai::load_balancer::ModelLoadBalancer;
use crate::database::models::QueueStatus;
use crate::database::queries::QueueRepo;
use crate::error::{CoreError, CoreResult};
use crate::notifications::Notifier;

pub use registry::ProcessorRegistry;

/// Seconds between producer/consumer ticks.
const TICK_SECS: u64 = 5;
/// Max item ids one discovery pass pulls per (processor, model).
const DISCOVERY_BATCH: i64 = 1000;
/// Max items one consumer tick processes from the selected queue.
const PROCESS_BATCH: i64 = 1000;

/// Everything the background loops need, cheap to clone into the tasks.
#[derive(Clone)]
struct SchedulerContext {
    queues: QueueRepo,
    balancer: Arc<ModelLoadBalancer>,
    registry: Arc<ProcessorRegistry>,
    notifier: Arc<dyn Notifier>,
}

pub struct AiTaskScheduler {
    context: SchedulerContext,
    shutdown: RwLock<Option<watch::Sender<bool>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl AiTaskScheduler {
    pub fn new(
        queues: QueueRepo,
        balancer: Arc<ModelLoadBalancer>,
        registry: Arc<ProcessorRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            context: SchedulerContext {
                queues,
                balancer,
                registry,
                notifier,
            },
            shutdown: RwLock::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Launch the producer and consumer loops.
    pub async fn start(&self) -> CoreResult<()> {
        let mut shutdown = self.shutdown.write().await;
        if shutdown.is_some() {
            return Err(CoreError::Config("AI scheduler is already running".into()));
        }
        let (tx, rx) = watch::channel(false);
        *shutdown = Some(tx);

        let producer = tokio::spawn(producer_loop(self.context.clone(), rx.clone()));
        let consumer = tokio::spawn(consumer_loop(self.context.clone(), rx));
        self.handles.lock().await.extend([producer, consumer]);

        tracing::info!("AI scheduler started");
        Ok(())
    }

    /// Signal shutdown and wait for both loops to finish their current
    /// iteration.
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown.write().await.take() {
            let _ = tx.send(true);
        }
        for handle in self.handles.lock().await.drain(..) {
            let _ = handle.await;
        }
        tracing::info!("AI scheduler stopped");
    }
}

async fn producer_loop(ctx: SchedulerContext, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("AI task producer loop started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(Duration::from_secs(TICK_SECS)) => {
                if let Err(e) = discover_work(&ctx).await {
                    tracing::error!("Work discovery failed: {}", e);
                }
            }
        }
    }
    tracing::info!("AI task producer loop stopped");
}

async fn consumer_loop(ctx: SchedulerContext, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("AI task consumer loop started");
    let cancel = shutdown.clone();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(Duration::from_secs(TICK_SECS)) => {
                if let Err(e) = process_queue_items(&ctx, &cancel).await {
                    tracing::error!("Queue processing failed: {}", e);
                }
            }
        }
    }
    tracing::info!("AI task consumer loop stopped");
}

/// One producer tick: clean up queues for removed models, then walk every
/// (processor, live model) pair and enqueue the item ids that need work.
async fn discover_work(ctx: &SchedulerContext) -> CoreResult<()> {
    let live_models = ctx.balancer.all_embedding_models();

    let removed = ctx
        .queues
        .delete_queues_for_dead_models(&live_models)
        .await?;
    for queue in &removed {
        tracing::info!(
            "Dropped queue '{}': model no longer configured",
            queue.queue_key
        );
    }

    let mut inserted_total = 0u64;
    for processor in ctx.registry.all() {
        for model_name in &live_models {
            let supported = ctx
                .balancer
                .endpoints_for(model_name)
                .iter()
                .any(|endpoint| processor.supported_by(endpoint.client.as_ref()));
            if !supported {
                continue;
            }

            let queue = ctx
                .queues
                .find_or_create(processor.task_type(), model_name)
                .await?;
            let ids = processor
                .find_pending_items(model_name, DISCOVERY_BATCH)
                .await?;
            let inserted = ctx.queues.add_items(&queue, &ids).await?;
            if inserted > 0 {
                tracing::debug!("Enqueued {} item(s) on '{}'", inserted, queue.queue_key);
            }
            inserted_total += inserted;
        }
    }

    if inserted_total > 0 || !removed.is_empty() {
        push_queue_status(ctx).await;
    }
    Ok(())
}

/// One consumer tick: drain pending items of a single queue, dispatching
/// each through provider failover.
async fn process_queue_items(
    ctx: &SchedulerContext,
    shutdown: &watch::Receiver<bool>,
) -> CoreResult<()> {
    let Some(queue) = ctx.queues.next_pending_queue().await? else {
        return Ok(());
    };

    ctx.queues
        .set_status(queue.id, QueueStatus::Processing)
        .await?;

    // A queue whose model lost every client fails wholesale instead of
    // item by item.
    if ctx.balancer.endpoints_for(&queue.model_name).is_empty() {
        let error = format!("no model client available for '{}'", queue.model_name);
        let failed = ctx.queues.fail_all_pending(&queue.queue_key, &error).await?;
        tracing::warn!(
            "Failed {} pending item(s) on '{}': {}",
            failed,
            queue.queue_key,
            error
        );
        ctx.queues.set_status(queue.id, QueueStatus::Idle).await?;
        push_queue_status(ctx).await;
        return Ok(());
    }

    let processor = ctx.registry.get(queue.task_type);
    let items = ctx.queues.pending_items(&queue.queue_key, PROCESS_BATCH).await?;

    for item in items {
        if *shutdown.borrow() {
            // Cooperative abort; pending items are picked up again on the
            // next start.
            return Ok(());
        }

        let Some(processor) = processor.clone() else {
            ctx.queues
                .fail_item(
                    item.id,
                    &format!("no processor registered for '{}'", queue.task_type),
                )
                .await?;
            push_queue_status(ctx).await;
            continue;
        };

        let result = ctx
            .balancer
            .try_all_providers(&queue.model_name, |endpoint| {
                let processor = processor.clone();
                let item_id = item.item_id;
                async move {
                    if !processor.supported_by(endpoint.client.as_ref()) {
                        return Err(CoreError::CapabilityMismatch {
                            model: endpoint.model.name.clone(),
                            capability: processor.task_type().as_str(),
                        });
                    }
                    processor.process_item(item_id, &endpoint).await
                }
            })
            .await;

        match result {
            Ok(()) => {
                ctx.queues.delete_item(item.id).await?;
            }
            Err(CoreError::Cancelled) => return Ok(()),
            Err(e) => {
                tracing::warn!("Task item {} on '{}' failed: {}", item.id, queue.queue_key, e);
                ctx.queues.fail_item(item.id, &e.to_string()).await?;
            }
        }
        push_queue_status(ctx).await;
    }

    let stats = ctx.queues.queue_stats(&queue.queue_key).await?;
    if stats.pending == 0 {
        ctx.queues.set_status(queue.id, QueueStatus::Idle).await?;
    }
    push_queue_status(ctx).await;
    Ok(())
}

async fn push_queue_status(ctx: &SchedulerContext) {
    match ctx.queues.status_summary().await {
        Ok(summary) => ctx.notifier.notify_ai_queue_status(summary),
        Err(e) => tracing::error!("Failed to load queue status: {}", e),
    }
}
