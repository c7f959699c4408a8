//! Tag repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use std::collections::HashSet;
use taglink_core::{Tag, TagId, TagList};

/// One element of a mixed tag input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRef {
    /// A persisted tag, used as is.
    Tag(Tag),
    /// Names to look up, in the text form: `"Nature, Question"` names two tags.
    Name(String),
}

impl From<Tag> for TagRef {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}

impl From<&str> for TagRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Tags to query by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagInput {
    List(TagList),
    Tag(Tag),
    Mixed(Vec<TagRef>),
}

impl From<TagList> for TagInput {
    fn from(list: TagList) -> Self {
        Self::List(list)
    }
}

/// Parses the text form, so `"Nature, Question"` names two tags.
impl From<&str> for TagInput {
    fn from(text: &str) -> Self {
        Self::List(TagList::parse(text))
    }
}

impl From<Tag> for TagInput {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}

impl From<Vec<TagRef>> for TagInput {
    fn from(items: Vec<TagRef>) -> Self {
        Self::Mixed(items)
    }
}

/// Repository for tag management.
#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Create a tag, optionally as a synonym of `canonical`.
    ///
    /// Fails with `Validation` when the name is empty or already taken
    /// (case-insensitively).
    async fn create_tag(&self, name: &str, canonical: Option<TagId>) -> MetadataResult<Tag>;

    /// Case-insensitive lookup, creating a canonical tag with the exact name if missing.
    async fn find_or_create_tag(&self, name: &str) -> MetadataResult<Tag>;

    /// Get a tag by ID.
    async fn get_tag(&self, id: TagId) -> MetadataResult<Option<Tag>>;

    /// Case-insensitive lookup by name.
    async fn find_tag_by_name(&self, name: &str) -> MetadataResult<Option<Tag>>;

    /// Look up many names at once. Unknown names are skipped; the result
    /// follows the order of `names` without duplicates.
    async fn find_tags_by_names(&self, names: &[String]) -> MetadataResult<Vec<Tag>>;

    /// Rename a tag, keeping its links and taggings.
    async fn rename_tag(&self, id: TagId, name: &str) -> MetadataResult<Tag>;

    /// Point a tag at a canonical tag (or clear the link with `None`).
    ///
    /// The link is flattened first: a cycle back to the tag clears it, a
    /// chain collapses to its root. Synonyms of the tag follow it to the root.
    async fn set_canonical_tag(&self, id: TagId, canonical: Option<TagId>)
    -> MetadataResult<Tag>;

    /// Tags linked to `id` as synonyms.
    async fn synonyms(&self, id: TagId) -> MetadataResult<Vec<Tag>>;

    /// Delete a tag and its taggings. Its synonyms become canonical.
    async fn delete_tag(&self, id: TagId) -> MetadataResult<()>;

    /// List all tags.
    async fn list_tags(&self) -> MetadataResult<Vec<Tag>>;

    /// Tags linked to at least one taggable of the given type.
    async fn tags_used_by(&self, taggable_type: &str) -> MetadataResult<Vec<Tag>>;

    /// Resolve query input to persisted tags.
    ///
    /// Tags are used directly; names (including each text-form string of a
    /// mixed input) that match no tag are dropped.
    async fn resolve_tags(&self, input: &TagInput) -> MetadataResult<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut names = Vec::new();
        match input {
            TagInput::List(list) => names.extend(list.iter().cloned()),
            TagInput::Tag(tag) => tags.push(tag.clone()),
            TagInput::Mixed(items) => {
                for item in items {
                    match item {
                        TagRef::Tag(tag) => tags.push(tag.clone()),
                        TagRef::Name(text) => names.extend(TagList::parse(text)),
                    }
                }
            }
        }
        if !names.is_empty() {
            tags.extend(self.find_tags_by_names(&names).await?);
        }

        let mut seen = HashSet::new();
        tags.retain(|tag| seen.insert(tag.id));
        Ok(tags)
    }
}
