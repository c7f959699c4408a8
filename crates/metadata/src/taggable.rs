//! Tag list access for host entities.
//!
//! Hosts call [`save_tags`] after persisting their own row. The tag list is
//! written only when it was edited since the last load or save.

use crate::error::MetadataResult;
use crate::repos::TaggingRepo;
use taglink_core::{SyncOptions, SyncReport, TagList, Taggable};

/// Current tag list of an entity.
///
/// Served from the pending edit or the cached projection when possible,
/// otherwise read from the entity's linked tags.
pub async fn tag_list<S, T>(store: &S, entity: &T) -> MetadataResult<TagList>
where
    S: TaggingRepo + ?Sized,
    T: Taggable + Sync,
{
    if let Some(list) = entity.tag_state().local_tag_list(entity.taggable_type()) {
        return Ok(list);
    }
    let tags = store.tags_for(&entity.taggable_ref()).await?;
    Ok(tags.into_iter().map(|tag| tag.name).collect())
}

/// Replace an entity's tag list with `text`. Written on the next [`save_tags`].
pub fn edit_tag_list<T: Taggable>(entity: &mut T, text: &str) {
    entity.tag_state_mut().set(TagList::parse(text));
}

/// Write a pending tag list edit.
///
/// Returns `None` without touching storage when no edit is pending. On
/// success the pending edit is cleared and the cached projection refreshed.
pub async fn save_tags<S, T>(
    store: &S,
    entity: &mut T,
    options: SyncOptions,
) -> MetadataResult<Option<SyncReport>>
where
    S: TaggingRepo + ?Sized,
    T: Taggable + Send,
{
    let Some(desired) = entity.tag_state().pending().cloned() else {
        return Ok(None);
    };
    let kind = entity.taggable_type().clone();
    let report = store
        .sync_tags(&kind, entity.taggable_id(), &desired, options)
        .await?;

    let state = entity.tag_state_mut();
    let cached = state.before_save(&kind).map(str::to_string);
    state.reload(cached);
    Ok(Some(report))
}
