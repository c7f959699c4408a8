//! Tag query repository trait.

use crate::error::MetadataResult;
use crate::repos::tags::TagInput;
use async_trait::async_trait;
use taglink_core::{CountOptions, FindOptions, TagCount, TaggableType};
use uuid::Uuid;

/// Read queries over taggables and their tags.
#[async_trait]
pub trait TagQueryRepo: Send + Sync {
    /// Ids of taggables of `kind` matching `tags` under `options`.
    ///
    /// Input that resolves to no known tag matches nothing, in every mode.
    async fn find_tagged_with(
        &self,
        kind: &TaggableType,
        tags: &TagInput,
        options: &FindOptions,
    ) -> MetadataResult<Vec<Uuid>>;

    /// Tag frequencies across all taggables of `kind`.
    async fn tag_counts(
        &self,
        kind: &TaggableType,
        options: &CountOptions,
    ) -> MetadataResult<Vec<TagCount>>;

    /// Type-wide frequencies of the tags one taggable carries.
    async fn tag_counts_for(
        &self,
        kind: &TaggableType,
        taggable_id: Uuid,
        options: &CountOptions,
    ) -> MetadataResult<Vec<TagCount>>;

    /// Tags used together with `tags` on taggables of `kind`, excluding `tags`.
    async fn find_related_tags(
        &self,
        kind: &TaggableType,
        tags: &TagInput,
        options: &CountOptions,
    ) -> MetadataResult<Vec<TagCount>>;
}
