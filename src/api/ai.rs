// Operator-facing queue endpoints: status, detail, retries, provider test.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::providers::create_client;
use crate::database::models::TaskType;
use crate::database::queries::{QueueStats, QueueStatusSummary};
use crate::error::{CoreError, CoreResult};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FailedItemDetail {
    pub id: i64,
    pub item_id: i64,
    pub task_type: TaskType,
    pub display_name: String,
    pub thumbnail_path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct QueueDetailResponse {
    pub id: i64,
    pub queue_key: String,
    pub task_type: TaskType,
    pub model_name: String,
    pub status: crate::database::models::QueueStatus,
    #[serde(flatten)]
    pub stats: QueueStats,
    pub items: Vec<FailedItemDetail>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

pub async fn get_queue_status(
    State(state): State<SharedState>,
) -> CoreResult<Json<QueueStatusSummary>> {
    let summary = state.queues.status_summary().await?;
    Ok(Json(summary))
}

pub async fn get_queue_detail(
    State(state): State<SharedState>,
    Path(queue_id): Path<i64>,
    Query(query): Query<DetailQuery>,
) -> CoreResult<Json<QueueDetailResponse>> {
    let queue = state
        .queues
        .get(queue_id)
        .await?
        .ok_or_else(|| CoreError::Data(format!("queue {} not found", queue_id)))?;

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 200);
    let stats = state.queues.queue_stats(&queue.queue_key).await?;
    let (items, total) = state
        .queues
        .failed_items_page(&queue.queue_key, page, page_size)
        .await?;

    // Resolve display names through the referenced entity.
    let item_ids: Vec<i64> = items.iter().map(|i| i.item_id).collect();
    let details = match queue.task_type {
        TaskType::TagEmbedding => {
            let tags = state.tags.get_many(&item_ids).await?;
            items
                .into_iter()
                .map(|item| {
                    let tag = tags.iter().find(|t| t.id == item.item_id);
                    FailedItemDetail {
                        id: item.id,
                        item_id: item.item_id,
                        task_type: item.task_type,
                        display_name: tag
                            .map(|t| t.name.clone())
                            .unwrap_or_else(|| format!("tag #{}", item.item_id)),
                        thumbnail_path: None,
                        error: item.error,
                        created_at: item.created_at,
                    }
                })
                .collect()
        }
        _ => {
            let images = state.images.get_many(&item_ids).await?;
            items
                .into_iter()
                .map(|item| {
                    let image = images.iter().find(|i| i.id == item.item_id);
                    FailedItemDetail {
                        id: item.id,
                        item_id: item.item_id,
                        task_type: item.task_type,
                        display_name: image
                            .map(|i| i.file_name.clone())
                            .unwrap_or_else(|| format!("image #{}", item.item_id)),
                        thumbnail_path: image.and_then(|i| i.thumbnail_path.clone()),
                        error: item.error,
                        created_at: item.created_at,
                    }
                })
                .collect()
        }
    };

    Ok(Json(QueueDetailResponse {
        id: queue.id,
        queue_key: queue.queue_key,
        task_type: queue.task_type,
        model_name: queue.model_name,
        status: queue.status,
        stats,
        items: details,
        total,
        page,
        page_size,
    }))
}

pub async fn retry_task_item(
    State(state): State<SharedState>,
    Path(item_id): Path<i64>,
) -> CoreResult<StatusCode> {
    if !state.queues.retry_item(item_id).await? {
        return Err(CoreError::Data(format!("no failed task item {}", item_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ignore_task_item(
    State(state): State<SharedState>,
    Path(item_id): Path<i64>,
) -> CoreResult<StatusCode> {
    if !state.queues.ignore_item(item_id).await? {
        return Err(CoreError::Data(format!("no task item {}", item_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct RetryQueueResponse {
    pub retried: u64,
}

pub async fn retry_queue_failed_items(
    State(state): State<SharedState>,
    Path(queue_id): Path<i64>,
) -> CoreResult<Json<RetryQueueResponse>> {
    let queue = state
        .queues
        .get(queue_id)
        .await?
        .ok_or_else(|| CoreError::Data(format!("queue {} not found", queue_id)))?;
    let retried = state.queues.retry_failed_in_queue(&queue.queue_key).await?;
    Ok(Json(RetryQueueResponse { retried }))
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub ok: bool,
}

/// Test one specific provider. Registered providers resolve through the
/// load balancer; disabled ones get a throwaway client.
pub async fn test_provider_connection(
    State(state): State<SharedState>,
    Path(provider_id): Path<Uuid>,
) -> CoreResult<Json<TestConnectionResponse>> {
    let client = match state.balancer.client_by_id(provider_id) {
        Some(client) => client,
        None => {
            let provider = state
                .providers
                .get(provider_id)
                .await?
                .ok_or_else(|| CoreError::Data(format!("provider {} not found", provider_id)))?;
            create_client(&provider)?
        }
    };
    client.test_connection().await?;
    Ok(Json(TestConnectionResponse { ok: true }))
}
