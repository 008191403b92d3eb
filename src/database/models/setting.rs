use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Key/value row backing the mutable runtime configuration.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
