// Semantic search + prompt optimisation endpoints.

use axum::extract::State;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::database::queries::ScoredImage;
use crate::error::{CoreError, CoreResult};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct SemanticSearchRequest {
    pub text: Option<String>,
    /// Base64-encoded query image.
    pub image_base64: Option<String>,
    pub model_name: Option<String>,
    /// `null` searches the whole library; `[]` is defined as the empty
    /// result.
    pub candidate_ids: Option<Vec<i64>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SemanticSearchResponse {
    pub results: Vec<ScoredImage>,
}

pub async fn semantic_search(
    State(state): State<SharedState>,
    Json(request): Json<SemanticSearchRequest>,
) -> CoreResult<Json<SemanticSearchResponse>> {
    let image = match &request.image_base64 {
        Some(encoded) => Some(
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| CoreError::Data(format!("query image is not valid base64: {}", e)))?,
        ),
        None => None,
    };

    let results = state
        .search
        .semantic_search_within_ids(
            image,
            request.text,
            request.model_name,
            request.candidate_ids,
            request.limit.unwrap_or(50).clamp(1, 500),
        )
        .await?;
    Ok(Json(SemanticSearchResponse { results }))
}

#[derive(Debug, Deserialize)]
pub struct OptimizePromptRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct OptimizePromptResponse {
    pub prompt: String,
}

pub async fn optimize_prompt(
    State(state): State<SharedState>,
    Json(request): Json<OptimizePromptRequest>,
) -> CoreResult<Json<OptimizePromptResponse>> {
    let prompt = state.search.optimize_prompt(&request.query).await?;
    Ok(Json(OptimizePromptResponse { prompt }))
}
