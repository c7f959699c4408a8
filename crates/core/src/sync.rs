//! Tag set synchronization planning.
//!
//! Stores apply a [`TagDiff`] inside one transaction: unlink `to_remove`,
//! then resolve or create and link `to_add`.

use crate::tag::{Tag, normalize_name_key};
use crate::tag_list::TagList;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Per-save synchronization settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Delete tags left without taggings (and without synonyms) by a save.
    #[serde(default)]
    pub destroy_unused: bool,
}

/// Changes needed to move a taggable from its linked tags to a desired list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Linked tags whose name is not in the desired list.
    pub to_remove: Vec<Tag>,
    /// Desired names not linked yet, in list order, one per name key.
    pub to_add: Vec<String>,
}

impl TagDiff {
    /// Compare linked tags with the desired list by case-insensitive name key.
    pub fn compute(current: &[Tag], desired: &TagList) -> Self {
        let desired_keys: HashSet<String> = desired
            .iter()
            .map(|name| normalize_name_key(name))
            .collect();
        let mut linked_keys: HashSet<String> = current.iter().map(Tag::name_key).collect();

        let to_remove = current
            .iter()
            .filter(|tag| !desired_keys.contains(&tag.name_key()))
            .cloned()
            .collect();
        let to_add = desired
            .iter()
            .filter(|name| linked_keys.insert(normalize_name_key(name)))
            .cloned()
            .collect();

        Self { to_remove, to_add }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Outcome of a save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Tags newly linked, in list order.
    pub added: Vec<Tag>,
    /// Tags unlinked.
    pub removed: Vec<Tag>,
    /// Unlinked tags deleted because nothing used them any more.
    pub pruned: Vec<Tag>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.pruned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagId;

    fn tag(name: &str) -> Tag {
        Tag {
            id: TagId::new(),
            name: name.to_string(),
            canonical_tag_id: None,
        }
    }

    #[test]
    fn test_minimal_diff() {
        let b = tag("b");
        let c = tag("c");
        let diff = TagDiff::compute(&[b, c.clone()], &TagList::parse("a, b"));
        assert_eq!(diff.to_remove, vec![c]);
        assert_eq!(diff.to_add, vec!["a".to_string()]);
    }

    #[test]
    fn test_case_only_change_is_not_a_diff() {
        let diff = TagDiff::compute(&[tag("nature")], &TagList::parse("Nature"));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_spellings_of_one_name_add_once() {
        let diff = TagDiff::compute(&[], &TagList::parse("Nature, nature, NATURE , bad"));
        assert_eq!(diff.to_add, vec!["Nature".to_string(), "bad".to_string()]);
    }

    #[test]
    fn test_empty_list_removes_everything() {
        let a = tag("a");
        let diff = TagDiff::compute(std::slice::from_ref(&a), &TagList::new());
        assert_eq!(diff.to_remove, vec![a]);
        assert!(diff.to_add.is_empty());
    }

    #[test]
    fn test_sync_options_default_keeps_unused_tags() {
        assert!(!SyncOptions::default().destroy_unused);
    }
}
