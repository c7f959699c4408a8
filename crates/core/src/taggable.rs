//! Host entities that carry tags.
//!
//! A host entity type describes itself with a [`TaggableType`] and exposes
//! its in-memory tag state through the [`Taggable`] trait. The tag state is
//! transient: only the cached projection column (if any) is persisted with
//! the host row, and only by the host.

use crate::tag_list::TagList;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Description of a host entity type that can be tagged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggableType {
    name: String,
    table: String,
    primary_key: String,
    cached_tag_list_column: Option<String>,
}

impl TaggableType {
    /// Describe a taggable type stored in `table`, keyed by an `id` column.
    ///
    /// `name` is the type tag written to `taggings.taggable_type`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::Error::Validation(
                "taggable type name cannot be empty".to_string(),
            ));
        }
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self {
            name,
            table,
            primary_key: "id".to_string(),
            cached_tag_list_column: None,
        })
    }

    /// Use a primary key column other than `id`.
    pub fn with_primary_key(mut self, column: impl Into<String>) -> crate::Result<Self> {
        let column = column.into();
        validate_identifier(&column)?;
        self.primary_key = column;
        Ok(self)
    }

    /// Mirror the tag list into `column` of the host table.
    pub fn with_cached_tag_list(mut self, column: impl Into<String>) -> crate::Result<Self> {
        let column = column.into();
        validate_identifier(&column)?;
        self.cached_tag_list_column = Some(column);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn cached_tag_list_column(&self) -> Option<&str> {
        self.cached_tag_list_column.as_deref()
    }

    /// Whether a cached tag list column is configured.
    pub fn caching_tag_list(&self) -> bool {
        self.cached_tag_list_column.is_some()
    }

    /// Reference to one entity of this type.
    pub fn entity(&self, id: Uuid) -> TaggableRef {
        TaggableRef {
            taggable_type: self.name.clone(),
            taggable_id: id,
        }
    }
}

/// SQL identifiers are interpolated into queries, so only plain names are allowed.
fn validate_identifier(ident: &str) -> crate::Result<()> {
    let mut chars = ident.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(crate::Error::Validation(format!(
            "invalid SQL identifier: {ident:?}"
        )));
    }
    Ok(())
}

/// Identity of one tagged entity.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggableRef {
    pub taggable_type: String,
    pub taggable_id: Uuid,
}

impl fmt::Debug for TaggableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaggableRef({}:{})", self.taggable_type, self.taggable_id)
    }
}

/// In-memory tag state of a host entity.
#[derive(Clone, Debug, Default)]
pub struct TagListState {
    pending: Option<TagList>,
    cached: Option<String>,
}

impl TagListState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for an entity loaded with its cached column value.
    pub fn with_cached(cached: Option<String>) -> Self {
        Self {
            pending: None,
            cached,
        }
    }

    /// Replace the tag list. The change is written on the next save.
    pub fn set(&mut self, list: impl Into<TagList>) {
        self.pending = Some(list.into());
    }

    /// The edited tag list, if an edit is pending.
    pub fn pending(&self) -> Option<&TagList> {
        self.pending.as_ref()
    }

    /// Value of the cached tag list column as loaded or last refreshed.
    pub fn cached(&self) -> Option<&str> {
        self.cached.as_deref()
    }

    /// Tag list served without touching storage: the pending edit, else the
    /// cached projection when the type caches one.
    pub fn local_tag_list(&self, kind: &TaggableType) -> Option<TagList> {
        if let Some(list) = &self.pending {
            return Some(list.clone());
        }
        if kind.caching_tag_list() {
            return self.cached.as_deref().map(TagList::parse);
        }
        None
    }

    /// Hook to run before the host persists its row.
    ///
    /// Refreshes the cached projection from the pending edit and returns the
    /// value the host should write to its cached column, if any.
    pub fn before_save(&mut self, kind: &TaggableType) -> Option<&str> {
        if !kind.caching_tag_list() {
            return None;
        }
        if let Some(list) = &self.pending {
            self.cached = Some(list.to_string());
        }
        self.cached.as_deref()
    }

    /// Discard any pending edit, e.g. when the host reloads its row.
    pub fn reload(&mut self, cached: Option<String>) {
        self.pending = None;
        self.cached = cached;
    }
}

/// A host entity that carries tags.
pub trait Taggable {
    /// Description of this entity's type.
    fn taggable_type(&self) -> &TaggableType;

    /// Primary key of this entity.
    fn taggable_id(&self) -> Uuid;

    fn tag_state(&self) -> &TagListState;

    fn tag_state_mut(&mut self) -> &mut TagListState;

    fn taggable_ref(&self) -> TaggableRef {
        self.taggable_type().entity(self.taggable_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_validated() {
        assert!(TaggableType::new("Post", "posts").is_ok());
        assert!(TaggableType::new("Post", "posts; DROP TABLE tags").is_err());
        assert!(TaggableType::new("", "posts").is_err());
        let kind = TaggableType::new("Post", "posts").unwrap();
        assert!(kind.clone().with_cached_tag_list("cached_tag_list").is_ok());
        assert!(kind.with_primary_key("1id").is_err());
    }

    #[test]
    fn test_local_tag_list_prefers_pending_edit() {
        let kind = TaggableType::new("Post", "posts")
            .unwrap()
            .with_cached_tag_list("cached_tag_list")
            .unwrap();
        let mut state = TagListState::with_cached(Some("a, b".to_string()));
        assert_eq!(state.local_tag_list(&kind), Some(TagList::parse("a, b")));

        state.set("c");
        assert_eq!(state.local_tag_list(&kind), Some(TagList::parse("c")));

        state.reload(Some("a, b".to_string()));
        assert!(state.pending().is_none());
        assert_eq!(state.local_tag_list(&kind), Some(TagList::parse("a, b")));
    }

    #[test]
    fn test_cache_ignored_without_column() {
        let kind = TaggableType::new("Post", "posts").unwrap();
        let mut state = TagListState::with_cached(Some("a, b".to_string()));
        assert_eq!(state.local_tag_list(&kind), None);
        assert_eq!(state.before_save(&kind), None);
    }

    #[test]
    fn test_before_save_refreshes_cache() {
        let kind = TaggableType::new("Post", "posts")
            .unwrap()
            .with_cached_tag_list("cached_tag_list")
            .unwrap();
        let mut state = TagListState::new();
        assert_eq!(state.before_save(&kind), None);

        state.set(TagList::parse(r#"nature, "a, b""#));
        assert_eq!(state.before_save(&kind), Some(r#"nature, "a, b""#));
        assert_eq!(state.cached(), Some(r#"nature, "a, b""#));
    }
}
