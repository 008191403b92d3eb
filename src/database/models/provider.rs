use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    SelfHosted,
    Aliyun,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::SelfHosted => "self_hosted",
            ProviderKind::Aliyun => "aliyun",
        }
    }

    pub fn from_str(s: &str) -> Option<ProviderKind> {
        match s {
            "openai" => Some(ProviderKind::OpenAi),
            "self_hosted" => Some(ProviderKind::SelfHosted),
            "aliyun" => Some(ProviderKind::Aliyun),
            _ => None,
        }
    }
}

/// One model exposed by a provider, with its declared capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderModelItem {
    pub name: String,
    #[serde(default)]
    pub supports_embedding: bool,
    #[serde(default)]
    pub supports_chat_completion: bool,
}

/// A configured provider instance: endpoint, credentials, and the models it
/// exposes. One logical model name may be served by several providers.
#[derive(Debug, Clone, Serialize)]
pub struct ModelProvider {
    pub id: Uuid,
    pub name: String,
    pub provider_type: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub enabled: bool,
    pub models: Vec<ProviderModelItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for ModelProvider {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let provider_type_str: String = row.try_get("provider_type")?;
        let provider_type = ProviderKind::from_str(&provider_type_str).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "provider_type".into(),
                source: format!("unknown provider type '{}'", provider_type_str).into(),
            }
        })?;
        let models_json: serde_json::Value = row.try_get("models")?;
        let models =
            serde_json::from_value(models_json).map_err(|e| sqlx::Error::ColumnDecode {
                index: "models".into(),
                source: Box::new(e),
            })?;

        Ok(ModelProvider {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            provider_type,
            api_key: row.try_get("api_key")?,
            base_url: row.try_get("base_url")?,
            enabled: row.try_get("enabled")?,
            models,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProviderRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub enabled: Option<bool>,
    pub models: Option<Vec<ProviderModelItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProviderRequest {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub enabled: Option<bool>,
    pub models: Option<Vec<ProviderModelItem>>,
}
