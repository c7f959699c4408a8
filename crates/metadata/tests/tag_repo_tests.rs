//! Integration tests for tag lookup, creation and synonym links.

mod common;

use common::{TestMetadata, seed};
use taglink_core::{Tag, TagId, TagList, is_canonical};
use taglink_metadata::{MetadataError, TagInput, TagRef, TagRepo};

fn names(tags: &[Tag]) -> Vec<&str> {
    tags.iter().map(|tag| tag.name.as_str()).collect()
}

#[tokio::test]
async fn test_find_or_create_is_case_insensitive() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let store = metadata.store();

    let created = store.find_or_create_tag("Nature").await.unwrap();
    assert!(is_canonical(&created));
    assert_eq!(created.name, "Nature");

    let found = store.find_or_create_tag("  NATURE ").await.unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.name, "Nature");
    assert_eq!(store.list_tags().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lookup_does_not_treat_names_as_patterns() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let store = metadata.store();

    store.create_tag("100%", None).await.unwrap();
    store.create_tag("a_b", None).await.unwrap();

    assert!(store.find_tag_by_name("100").await.unwrap().is_none());
    assert!(store.find_tag_by_name("%").await.unwrap().is_none());
    assert!(store.find_tag_by_name("axb").await.unwrap().is_none());
    assert_eq!(
        store.find_tag_by_name("A_B").await.unwrap().unwrap().name,
        "a_b"
    );
}

#[tokio::test]
async fn test_create_rejects_empty_and_duplicate_names() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let store = metadata.store();

    assert!(matches!(
        store.create_tag("   ", None).await,
        Err(MetadataError::Validation(_))
    ));
    assert!(matches!(
        store.find_or_create_tag("").await,
        Err(MetadataError::Validation(_))
    ));

    store.create_tag("Nature", None).await.unwrap();
    assert!(matches!(
        store.create_tag("nature", None).await,
        Err(MetadataError::Validation(_))
    ));
}

#[tokio::test]
async fn test_canonical_fixtures() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    assert!(is_canonical(&fixtures.fantastic));
    assert!(is_canonical(&fixtures.good));
    assert!(!is_canonical(&fixtures.awesome));
    assert_eq!(fixtures.awesome.canonical_tag_id, Some(fixtures.fantastic.id));

    assert_eq!(
        store.synonyms(fixtures.fantastic.id).await.unwrap(),
        vec![fixtures.awesome.clone()]
    );
    assert!(store.synonyms(fixtures.awesome.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_tags_are_canonical_by_default() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let tag = metadata.store().create_tag("new tag", None).await.unwrap();
    assert!(is_canonical(&tag));
}

#[tokio::test]
async fn test_canonical_hierarchy_is_flat() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    let sup = store
        .create_tag("Super", Some(fixtures.awesome.id))
        .await
        .unwrap();
    assert_eq!(sup.canonical_tag_id, Some(fixtures.fantastic.id));

    let stored = store.get_tag(sup.id).await.unwrap().unwrap();
    assert_eq!(stored.canonical_tag_id, Some(fixtures.fantastic.id));
}

#[tokio::test]
async fn test_self_link_is_cleared() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    let tag = store
        .set_canonical_tag(fixtures.good.id, Some(fixtures.good.id))
        .await
        .unwrap();
    assert!(is_canonical(&tag));
}

#[tokio::test]
async fn test_transitive_cycle_is_cleared() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    // fantastic <- awesome; pointing fantastic at awesome walks back to fantastic.
    let fantastic = store
        .set_canonical_tag(fixtures.fantastic.id, Some(fixtures.awesome.id))
        .await
        .unwrap();
    assert!(is_canonical(&fantastic));

    let awesome = store.get_tag(fixtures.awesome.id).await.unwrap().unwrap();
    assert_eq!(awesome.canonical_tag_id, Some(fixtures.fantastic.id));
}

#[tokio::test]
async fn test_synonyms_follow_tag_to_new_root() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    let fantastic = store
        .set_canonical_tag(fixtures.fantastic.id, Some(fixtures.good.id))
        .await
        .unwrap();
    assert_eq!(fantastic.canonical_tag_id, Some(fixtures.good.id));

    let awesome = store.get_tag(fixtures.awesome.id).await.unwrap().unwrap();
    assert_eq!(awesome.canonical_tag_id, Some(fixtures.good.id));

    for tag in store.list_tags().await.unwrap() {
        if let Some(target) = tag.canonical_tag_id {
            let target = store.get_tag(target).await.unwrap().unwrap();
            assert!(is_canonical(&target), "{} points at a synonym", tag.name);
        }
    }
}

#[tokio::test]
async fn test_clearing_canonical_link() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    let awesome = store
        .set_canonical_tag(fixtures.awesome.id, None)
        .await
        .unwrap();
    assert!(is_canonical(&awesome));
    assert!(store.synonyms(fixtures.fantastic.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_canonical_tag_promotes_synonyms() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    store.delete_tag(fixtures.fantastic.id).await.unwrap();

    assert!(store.get_tag(fixtures.fantastic.id).await.unwrap().is_none());
    let awesome = store.get_tag(fixtures.awesome.id).await.unwrap().unwrap();
    assert!(is_canonical(&awesome));
    assert_eq!(metadata.tagging_count(fixtures.sam_summer).await, 0);
    assert_eq!(metadata.tagging_count(fixtures.sam_spring).await, 2);
}

#[tokio::test]
async fn test_id_addressed_operations_report_not_found() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let store = metadata.store();
    let tag = store.create_tag("Nature", None).await.unwrap();
    let missing = TagId::new();

    assert!(store.get_tag(missing).await.unwrap().is_none());
    assert!(matches!(
        store.delete_tag(missing).await,
        Err(MetadataError::NotFound(_))
    ));
    assert!(matches!(
        store.rename_tag(missing, "x").await,
        Err(MetadataError::NotFound(_))
    ));
    assert!(matches!(
        store.set_canonical_tag(missing, None).await,
        Err(MetadataError::NotFound(_))
    ));
    assert!(matches!(
        store.set_canonical_tag(tag.id, Some(missing)).await,
        Err(MetadataError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_rename_tag() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    let renamed = store.rename_tag(fixtures.bad.id, "Poor").await.unwrap();
    assert_eq!(renamed.name, "Poor");
    assert_eq!(
        store.find_tag_by_name("poor").await.unwrap().map(|t| t.id),
        Some(fixtures.bad.id)
    );

    // Case-only rename of the same tag is allowed.
    store.rename_tag(fixtures.bad.id, "POOR").await.unwrap();

    assert!(matches!(
        store.rename_tag(fixtures.bad.id, "nature").await,
        Err(MetadataError::Validation(_))
    ));
}

#[tokio::test]
async fn test_tags_used_by_type() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    seed(&metadata).await;
    let store = metadata.store();
    store.create_tag("unused", None).await.unwrap();

    let photo_tags = store.tags_used_by("Photo").await.unwrap();
    assert_eq!(names(&photo_tags), ["Nature", "Question"]);

    let post_tags = store.tags_used_by("Post").await.unwrap();
    assert_eq!(
        names(&post_tags),
        ["awesome", "Bad", "fantastic", "Nature", "Question", "Very good"]
    );
}

#[tokio::test]
async fn test_resolve_drops_unknown_names() {
    let metadata = TestMetadata::new().await.expect("Failed to create metadata");
    let fixtures = seed(&metadata).await;
    let store = metadata.store();

    let tags = store
        .resolve_tags(&TagInput::from("nature, missing, NATURE, Very good"))
        .await
        .unwrap();
    assert_eq!(names(&tags), ["Nature", "Very good"]);

    let mixed = TagInput::from(vec![
        TagRef::from(fixtures.bad.clone()),
        TagRef::from("question"),
        TagRef::from("nowhere"),
    ]);
    let tags = store.resolve_tags(&mixed).await.unwrap();
    assert_eq!(names(&tags), ["Bad", "Question"]);

    let listed = TagInput::from(vec![
        TagRef::from("Nature, 'Very good'"),
        TagRef::from(fixtures.nature.clone()),
    ]);
    let tags = store.resolve_tags(&listed).await.unwrap();
    assert_eq!(names(&tags), ["Nature", "Very good"]);

    let none = store
        .resolve_tags(&TagInput::List(TagList::new()))
        .await
        .unwrap();
    assert!(none.is_empty());
}
