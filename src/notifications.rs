// Outbound push channel: queue status, migration progress, and smart-album
// progress fan out to connected WebSocket sessions.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::database::models::MigrationTaskView;
use crate::database::queries::QueueStatusSummary;
use crate::scheduler::smart_album::SmartAlbumStatusView;

/// One frame on the wire, tagged by kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WsFrame {
    AiQueueStatus(QueueStatusSummary),
    MigrationProgress(Vec<MigrationTaskView>),
    SmartAlbumProgress(SmartAlbumStatusView),
}

/// Push sink the core reports progress through. Implementations must not
/// block the caller; fan-out happens asynchronously.
pub trait Notifier: Send + Sync {
    fn notify_ai_queue_status(&self, status: QueueStatusSummary);
    fn notify_migration_progress(&self, tasks: Vec<MigrationTaskView>);
    fn notify_smart_album_progress(&self, status: SmartAlbumStatusView);
}

/// Broadcast-backed notifier. WebSocket sessions subscribe and forward
/// frames; a send with no subscribers is a no-op, and lagging subscribers
/// drop frames instead of slowing the core down.
pub struct WsNotifier {
    tx: broadcast::Sender<String>,
}

impl WsNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    fn push(&self, frame: WsFrame) {
        match serde_json::to_string(&frame) {
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => tracing::error!("Failed to serialize notification frame: {}", e),
        }
    }
}

impl Default for WsNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for WsNotifier {
    fn notify_ai_queue_status(&self, status: QueueStatusSummary) {
        self.push(WsFrame::AiQueueStatus(status));
    }

    fn notify_migration_progress(&self, tasks: Vec<MigrationTaskView>) {
        self.push(WsFrame::MigrationProgress(tasks));
    }

    fn notify_smart_album_progress(&self, status: SmartAlbumStatusView) {
        self.push(WsFrame::SmartAlbumProgress(status));
    }
}

/// Notifier that swallows everything. Used where progress has no audience.
#[derive(Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify_ai_queue_status(&self, _status: QueueStatusSummary) {}
    fn notify_migration_progress(&self, _tasks: Vec<MigrationTaskView>) {}
    fn notify_smart_album_progress(&self, _status: SmartAlbumStatusView) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_reach_subscribers_as_tagged_json() {
        let notifier = WsNotifier::new();
        let mut rx = notifier.subscribe();

        notifier.notify_ai_queue_status(QueueStatusSummary {
            queues: Vec::new(),
            total_pending: 3,
            total_failed: 1,
        });

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "ai_queue_status");
        assert_eq!(value["payload"]["total_pending"], 3);
    }

    #[test]
    fn test_send_without_subscribers_does_not_block() {
        let notifier = WsNotifier::new();
        notifier.notify_migration_progress(Vec::new());
    }
}
