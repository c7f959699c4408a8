//! Canonical tag resolution.
//!
//! Synonym links form a hierarchy at most one level deep: a tag is either
//! canonical (no link) or points directly at a canonical tag. Links are
//! flattened before they are written, so a candidate link is resolved against
//! a snapshot of the existing links rather than fixed up afterwards.

use crate::tag::{Tag, TagId};
use std::collections::{HashMap, HashSet};

/// Read access to the current synonym links.
pub trait CanonicalLinks {
    /// The canonical link of `id`, or `None` if `id` is canonical or unknown.
    fn link_of(&self, id: TagId) -> Option<TagId>;
}

impl CanonicalLinks for HashMap<TagId, Option<TagId>> {
    fn link_of(&self, id: TagId) -> Option<TagId> {
        self.get(&id).copied().flatten()
    }
}

impl CanonicalLinks for [Tag] {
    fn link_of(&self, id: TagId) -> Option<TagId> {
        self.iter()
            .find(|tag| tag.id == id)
            .and_then(|tag| tag.canonical_tag_id)
    }
}

/// Resolve the link `tag` should store when `proposed` is assigned to it.
///
/// Walks from `proposed` along existing links. A walk that reaches `tag`
/// again (including `proposed == tag`) yields `None` and `tag` becomes
/// canonical. Otherwise the result is the last tag reached, which is the root
/// of the chain.
pub fn flatten<L>(tag: TagId, proposed: Option<TagId>, links: &L) -> Option<TagId>
where
    L: CanonicalLinks + ?Sized,
{
    let mut current = proposed?;
    let mut seen = HashSet::new();
    loop {
        if current == tag {
            return None;
        }
        seen.insert(current);
        match links.link_of(current) {
            Some(next) if !seen.contains(&next) => current = next,
            _ => return Some(current),
        }
    }
}

/// Whether the tag has no synonym link.
pub fn is_canonical(tag: &Tag) -> bool {
    tag.canonical_tag_id.is_none()
}

/// The canonical group a tag counts towards: itself, or its link target.
pub fn canonical_group(tag: &Tag) -> TagId {
    tag.canonical_tag_id.unwrap_or(tag.id)
}

/// Distinct canonical groups of `tags`, in first-seen order.
pub fn canonical_groups(tags: &[Tag]) -> Vec<TagId> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(canonical_group)
        .filter(|group| seen.insert(*group))
        .collect()
}
