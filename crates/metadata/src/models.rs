//! Database models mapping to the tagging schema.

use sqlx::FromRow;
use taglink_core::{Tag, TagCount};
use time::OffsetDateTime;
use uuid::Uuid;

/// Tag record.
#[derive(Debug, Clone, FromRow)]
pub struct TagRow {
    pub id: Uuid,
    pub name: String,
    /// Lowercased, trimmed name carrying the uniqueness constraint.
    pub name_key: String,
    pub canonical_tag_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: row.id.into(),
            name: row.name,
            canonical_tag_id: row.canonical_tag_id.map(Into::into),
        }
    }
}

/// Aggregate row produced by count queries.
#[derive(Debug, Clone, FromRow)]
pub struct TagCountRow {
    pub id: Uuid,
    pub name: String,
    pub canonical_tag_id: Option<Uuid>,
    pub count: i64,
}

impl From<TagCountRow> for TagCount {
    fn from(row: TagCountRow) -> Self {
        TagCount {
            tag: Tag {
                id: row.id.into(),
                name: row.name,
                canonical_tag_id: row.canonical_tag_id.map(Into::into),
            },
            count: u64::try_from(row.count).unwrap_or(0),
        }
    }
}
