//! Tagging repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use taglink_core::{SyncOptions, SyncReport, Tag, TagList, TaggableRef, TaggableType};
use uuid::Uuid;

/// Repository for the links between taggables and tags.
#[async_trait]
pub trait TaggingRepo: Send + Sync {
    /// Tags linked to a taggable, in the order they were linked.
    async fn tags_for(&self, taggable: &TaggableRef) -> MetadataResult<Vec<Tag>>;

    /// Distinct canonical tags of a taggable's tags.
    async fn canonical_tags_for(&self, taggable: &TaggableRef) -> MetadataResult<Vec<Tag>>;

    /// Make a taggable's links match `desired` in one transaction.
    ///
    /// Unlinks tags missing from the list, links new names (creating tags
    /// as needed) and, when `kind` caches its tag list, writes the list's
    /// text form to the host row in the same transaction.
    async fn sync_tags(
        &self,
        kind: &TaggableType,
        taggable_id: Uuid,
        desired: &TagList,
        options: SyncOptions,
    ) -> MetadataResult<SyncReport>;

    /// Remove every link of a taggable, e.g. when the host entity is deleted.
    /// Returns the number of links removed.
    async fn delete_taggings_for(&self, taggable: &TaggableRef) -> MetadataResult<u64>;
}
