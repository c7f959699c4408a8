//! Common test utilities and fixtures.

use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use taglink_core::{SyncOptions, Tag, TagList, TagListState, Taggable, TaggableType};
use taglink_metadata::{MetadataResult, SqliteStore, TagRepo, TagStore, TaggingRepo};
use tempfile::TempDir;
use uuid::Uuid;

/// A test tag store that cleans up on drop.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<dyn TagStore>,
    pub(crate) sqlite_store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestMetadata {
    /// Create a store in a temp directory, with `posts` and `photos` host tables.
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let store = SqliteStore::new(&db_path, None).await?;
        let arc_store = Arc::new(store);

        sqlx::query(
            "CREATE TABLE posts (id BLOB PRIMARY KEY, title TEXT NOT NULL, cached_tag_list TEXT); \
             CREATE TABLE photos (id BLOB PRIMARY KEY, title TEXT NOT NULL);",
        )
        .execute(arc_store.pool())
        .await?;

        Ok(Self {
            store: arc_store.clone(),
            sqlite_store: arc_store,
            _temp_dir: temp_dir,
        })
    }

    /// Get a reference to the tag store.
    pub fn store(&self) -> Arc<dyn TagStore> {
        self.store.clone()
    }

    /// Get a reference to the SQLite connection pool for raw queries.
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite_store.pool()
    }

    /// Insert a host row and return its id.
    pub async fn insert_host(&self, kind: &TaggableType, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(&format!(
            "INSERT INTO {} (id, title) VALUES (?, ?)",
            kind.table()
        ))
        .bind(id)
        .bind(title)
        .execute(self.pool())
        .await
        .expect("Failed to insert host row");
        id
    }

    /// Insert a host row and link it to the tags in `tag_list`.
    pub async fn tagged_host(&self, kind: &TaggableType, title: &str, tag_list: &str) -> Uuid {
        let id = self.insert_host(kind, title).await;
        self.store
            .sync_tags(kind, id, &TagList::parse(tag_list), SyncOptions::default())
            .await
            .expect("Failed to tag host row");
        id
    }

    /// Cached tag list column of a post, as stored.
    pub async fn cached_tag_list(&self, post_id: Uuid) -> Option<String> {
        sqlx::query_scalar("SELECT cached_tag_list FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .expect("Failed to read cached tag list")
    }

    /// Number of tagging rows of one taggable.
    pub async fn tagging_count(&self, taggable_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM taggings WHERE taggable_id = ?")
            .bind(taggable_id)
            .fetch_one(self.pool())
            .await
            .expect("Failed to count taggings")
    }
}

/// Posts cache their tag list in `posts.cached_tag_list`.
pub fn post_type() -> TaggableType {
    TaggableType::new("Post", "posts")
        .and_then(|kind| kind.with_cached_tag_list("cached_tag_list"))
        .expect("valid taggable type")
}

/// Photos keep no cached tag list.
#[allow(dead_code)]
pub fn photo_type() -> TaggableType {
    TaggableType::new("Photo", "photos").expect("valid taggable type")
}

/// In-memory host entity for tag list round trips.
#[allow(dead_code)]
pub struct Post {
    pub id: Uuid,
    kind: TaggableType,
    tags: TagListState,
}

#[allow(dead_code)]
impl Post {
    /// A post as loaded from its row.
    pub fn loaded(id: Uuid, cached_tag_list: Option<String>) -> Self {
        Self {
            id,
            kind: post_type(),
            tags: TagListState::with_cached(cached_tag_list),
        }
    }
}

impl Taggable for Post {
    fn taggable_type(&self) -> &TaggableType {
        &self.kind
    }

    fn taggable_id(&self) -> Uuid {
        self.id
    }

    fn tag_state(&self) -> &TagListState {
        &self.tags
    }

    fn tag_state_mut(&mut self) -> &mut TagListState {
        &mut self.tags
    }
}

/// Seeded tags and posts.
#[allow(dead_code)]
pub struct Fixtures {
    pub fantastic: Tag,
    /// Synonym of `fantastic`.
    pub awesome: Tag,
    /// Named "Very good".
    pub good: Tag,
    pub nature: Tag,
    pub bad: Tag,
    pub question: Tag,
    pub sam_spring: Uuid,
    pub sam_summer: Uuid,
    pub jonathan_sky: Uuid,
    pub jonathan_grass: Uuid,
    pub jonathan_rain: Uuid,
    pub small_dog: Uuid,
}

/// Seed the standard tag fixtures.
///
/// | post           | tags                    |
/// |----------------|-------------------------|
/// | sam_spring     | Very good, awesome      |
/// | sam_summer     | fantastic               |
/// | jonathan_sky   | Very good, Nature       |
/// | jonathan_grass | Very good, Nature, Bad  |
/// | jonathan_rain  | Nature, Question        |
///
/// Photo `small_dog` carries `Nature, Question`.
#[allow(dead_code)]
pub async fn seed(metadata: &TestMetadata) -> Fixtures {
    let store = metadata.store();
    let fantastic = store.create_tag("fantastic", None).await.unwrap();
    let awesome = store.create_tag("awesome", Some(fantastic.id)).await.unwrap();
    let good = store.create_tag("Very good", None).await.unwrap();
    let nature = store.create_tag("Nature", None).await.unwrap();
    let bad = store.create_tag("Bad", None).await.unwrap();
    let question = store.create_tag("Question", None).await.unwrap();

    let posts = post_type();
    let sam_spring = metadata
        .tagged_host(&posts, "Spring", "\"Very good\", awesome")
        .await;
    let sam_summer = metadata.tagged_host(&posts, "Summer", "fantastic").await;
    let jonathan_sky = metadata
        .tagged_host(&posts, "Sky", "Very good, Nature")
        .await;
    let jonathan_grass = metadata
        .tagged_host(&posts, "Grass", "Very good, Nature, Bad")
        .await;
    let jonathan_rain = metadata
        .tagged_host(&posts, "Rain", "Nature, Question")
        .await;
    let small_dog = metadata
        .tagged_host(&photo_type(), "Small dog", "Nature, Question")
        .await;

    Fixtures {
        fantastic,
        awesome,
        good,
        nature,
        bad,
        question,
        sam_spring,
        sam_summer,
        jonathan_sky,
        jonathan_grass,
        jonathan_rain,
        small_dog,
    }
}

/// Sort ids for order-insensitive comparison.
#[allow(dead_code)]
pub fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}
