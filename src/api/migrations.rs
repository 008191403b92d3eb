// Storage migration endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{Image, MigrationTaskView};
use crate::error::CoreResult;
use crate::state::SharedState;
use crate::storage::migration::CreateMigrationRequest;

pub async fn list_migrations(
    State(state): State<SharedState>,
) -> CoreResult<Json<Vec<MigrationTaskView>>> {
    let views = state.migrations.list().await?;
    Ok(Json(views))
}

pub async fn create_migration(
    State(state): State<SharedState>,
    Json(request): Json<CreateMigrationRequest>,
) -> CoreResult<(StatusCode, Json<MigrationTaskView>)> {
    let view = state.migrations.create(request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Debug, Serialize)]
pub struct MigrationPreviewResponse {
    pub total_files: i64,
    pub sample: Vec<Image>,
}

pub async fn preview_migration(
    State(state): State<SharedState>,
    Json(request): Json<CreateMigrationRequest>,
) -> CoreResult<Json<MigrationPreviewResponse>> {
    let (total_files, sample) = state.migrations.preview(&request).await?;
    Ok(Json(MigrationPreviewResponse {
        total_files,
        sample,
    }))
}

pub async fn pause_migration(
    State(state): State<SharedState>,
    Path(task_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    state.migrations.pause(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_migration(
    State(state): State<SharedState>,
    Path(task_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    state.migrations.resume(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn retry_failed_files(
    State(state): State<SharedState>,
    Path(task_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    state.migrations.retry_failed(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dismiss_migration(
    State(state): State<SharedState>,
    Path(task_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    state.migrations.dismiss(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct FailedFileDetail {
    pub record_id: i64,
    pub image_id: i64,
    pub file_name: Option<String>,
    pub relative_path: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub async fn get_failed_file_records(
    State(state): State<SharedState>,
    Path(task_id): Path<Uuid>,
) -> CoreResult<Json<Vec<FailedFileDetail>>> {
    let records = state.migrations.failed_files(task_id).await?;
    let image_ids: Vec<i64> = records.iter().map(|r| r.image_id).collect();
    let images = state.images.get_many(&image_ids).await?;

    let details = records
        .into_iter()
        .map(|record| {
            let image = images.iter().find(|i| i.id == record.image_id);
            FailedFileDetail {
                record_id: record.id,
                image_id: record.image_id,
                file_name: image.map(|i| i.file_name.clone()),
                relative_path: image.map(|i| i.relative_path.clone()),
                error: record.error,
                updated_at: record.updated_at,
            }
        })
        .collect();
    Ok(Json(details))
}
