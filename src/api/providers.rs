// Provider CRUD. Every change re-applies settings so the load balancer
// tracks the configured inventory.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::database::models::{CreateProviderRequest, ModelProvider, UpdateProviderRequest};
use crate::error::{CoreError, CoreResult};
use crate::state::SharedState;

pub async fn list_providers(
    State(state): State<SharedState>,
) -> CoreResult<Json<Vec<ModelProvider>>> {
    let providers = state.providers.list().await?;
    Ok(Json(providers))
}

pub async fn create_provider(
    State(state): State<SharedState>,
    Json(request): Json<CreateProviderRequest>,
) -> CoreResult<(StatusCode, Json<ModelProvider>)> {
    let provider = state.providers.create(request).await?;
    state.settings.apply().await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

pub async fn update_provider(
    State(state): State<SharedState>,
    Path(provider_id): Path<Uuid>,
    Json(request): Json<UpdateProviderRequest>,
) -> CoreResult<Json<ModelProvider>> {
    let provider = state
        .providers
        .update(provider_id, request)
        .await?
        .ok_or_else(|| CoreError::Data(format!("provider {} not found", provider_id)))?;
    state.settings.apply().await?;
    Ok(Json(provider))
}

pub async fn delete_provider(
    State(state): State<SharedState>,
    Path(provider_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    if !state.providers.delete(provider_id).await? {
        return Err(CoreError::Data(format!(
            "provider {} not found",
            provider_id
        )));
    }
    state.settings.apply().await?;
    Ok(StatusCode::NO_CONTENT)
}
