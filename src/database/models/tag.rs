use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// Sentinel sub-category marking a virtual "category router" tag. Router
/// vectors steer auto-tagging towards a main category and are excluded from
/// ordinary similarity search.
pub const MAIN_CATEGORY_ROUTER: &str = "__main_category__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Category,
    Subcategory,
    Tag,
    Album,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Category => "category",
            TagType::Subcategory => "subcategory",
            TagType::Tag => "tag",
            TagType::Album => "album",
        }
    }

    pub fn from_str(s: &str) -> TagType {
        match s {
            "category" => TagType::Category,
            "subcategory" => TagType::Subcategory,
            "album" => TagType::Album,
            _ => TagType::Tag,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub tag_type: TagType,
    pub main_category: Option<String>,
    pub sub_category_id: Option<String>,
    pub vector_description: Option<String>,
    pub is_smart_album: bool,
    pub cover_image_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Whether this tag is a virtual main-category router vector.
    pub fn is_category_router(&self) -> bool {
        self.sub_category_id.as_deref() == Some(MAIN_CATEGORY_ROUTER)
    }
}

impl FromRow<'_, PgRow> for Tag {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let tag_type_str: String = row.try_get("tag_type")?;
        Ok(Tag {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            tag_type: TagType::from_str(&tag_type_str),
            main_category: row.try_get("main_category")?,
            sub_category_id: row.try_get("sub_category_id")?,
            vector_description: row.try_get("vector_description")?,
            is_smart_album: row.try_get("is_smart_album")?,
            cover_image_id: row.try_get("cover_image_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
