// Runtime settings endpoints.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;

use crate::config::PlatformConfig;
use crate::error::CoreResult;
use crate::state::SharedState;

pub async fn get_settings(
    State(state): State<SharedState>,
) -> CoreResult<Json<HashMap<String, String>>> {
    let values = state.settings.get_all().await?;
    Ok(Json(values))
}

/// Persist a batch of settings; the new config snapshot and model registry
/// are live when this returns.
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(entries): Json<HashMap<String, String>>,
) -> CoreResult<Json<PlatformConfig>> {
    state.settings.update(entries).await?;
    Ok(Json(state.config.snapshot().as_ref().clone()))
}
