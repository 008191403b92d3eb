use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{
    CreateProviderRequest, ModelProvider, ProviderKind, UpdateProviderRequest,
};
use crate::error::{CoreError, CoreResult};

#[derive(Clone)]
pub struct ProviderRepo {
    pool: PgPool,
}

impl ProviderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Option<ModelProvider>> {
        let provider = sqlx::query_as("SELECT * FROM model_providers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(provider)
    }

    pub async fn list(&self) -> CoreResult<Vec<ModelProvider>> {
        let providers = sqlx::query_as("SELECT * FROM model_providers ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(providers)
    }

    pub async fn list_enabled(&self) -> CoreResult<Vec<ModelProvider>> {
        let providers = sqlx::query_as(
            "SELECT * FROM model_providers WHERE enabled = TRUE ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(providers)
    }

    pub async fn create(&self, request: CreateProviderRequest) -> CoreResult<ModelProvider> {
        let provider_type = ProviderKind::from_str(&request.provider_type).ok_or_else(|| {
            CoreError::Config(format!("unknown provider type '{}'", request.provider_type))
        })?;
        let models = serde_json::to_value(request.models.unwrap_or_default())
            .map_err(|e| CoreError::Invariant(format!("model list not serializable: {}", e)))?;

        let provider = sqlx::query_as(
            "INSERT INTO model_providers (id, name, provider_type, api_key, base_url, enabled, models)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(provider_type.as_str())
        .bind(&request.api_key)
        .bind(&request.base_url)
        .bind(request.enabled.unwrap_or(true))
        .bind(models)
        .fetch_one(&self.pool)
        .await?;
        Ok(provider)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProviderRequest,
    ) -> CoreResult<Option<ModelProvider>> {
        let models = match request.models {
            Some(models) => Some(serde_json::to_value(models).map_err(|e| {
                CoreError::Invariant(format!("model list not serializable: {}", e))
            })?),
            None => None,
        };

        let provider = sqlx::query_as(
            "UPDATE model_providers
             SET name = COALESCE($2, name),
                 api_key = COALESCE($3, api_key),
                 base_url = COALESCE($4, base_url),
                 enabled = COALESCE($5, enabled),
                 models = COALESCE($6, models),
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.api_key)
        .bind(&request.base_url)
        .bind(request.enabled)
        .bind(models)
        .fetch_optional(&self.pool)
        .await?;
        Ok(provider)
    }

    pub async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM model_providers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
