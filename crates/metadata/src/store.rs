//! Tag store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{TagQueryRepo, TagRepo, TaggingRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined tag store trait.
#[async_trait]
pub trait TagStore: TagRepo + TaggingRepo + TagQueryRepo + Send + Sync {
    /// Create the tagging schema if missing.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based tag store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite tag store and run migrations.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600); // 10 minutes default

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One connection serializes writers; concurrent saves queue instead of failing.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout: Duration::from_secs(query_timeout_secs),
        };
        store.migrate().await?;

        tracing::info!(path = %path.display(), "Opened SQLite tag store");
        tracing::warn!(
            query_timeout_secs = query_timeout_secs,
            "SQLite query timeout is advisory only - a timed out read is abandoned, \
             but SQLite cannot cancel the statement already running."
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run a read query under the configured timeout.
    async fn timed<T, F>(&self, query: F) -> MetadataResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(MetadataError::Internal(format!(
                "query exceeded timeout of {}s",
                self.query_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl TagStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::debug!("Tagging schema is up to date");
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::{TagCountRow, TagRow};
    use crate::repos::TagInput;
    use crate::sql::{bind_values, render, sql_timestamp};
    use sqlx::SqliteConnection;
    use std::collections::{HashMap, HashSet};
    use taglink_core::canonical::flatten;
    use taglink_core::query::QuerySpec;
    use taglink_core::tag::validate_name;
    use taglink_core::{
        CountOptions, FindOptions, SyncOptions, SyncReport, Tag, TagCount, TagDiff, TagId,
        TagList, TagQueryCompiler, TaggableRef, TaggableType, normalize_name_key,
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn now() -> OffsetDateTime {
        sql_timestamp(OffsetDateTime::now_utc())
    }

    async fn fetch_tag(conn: &mut SqliteConnection, id: TagId) -> MetadataResult<Option<TagRow>> {
        let row = sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE id = ?")
            .bind(Uuid::from(id))
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    async fn require_tag(conn: &mut SqliteConnection, id: TagId) -> MetadataResult<TagRow> {
        fetch_tag(conn, id)
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("tag {id} not found")))
    }

    /// Links reachable from `start`, each visited once even if the data has a cycle.
    async fn load_chain(
        conn: &mut SqliteConnection,
        start: TagId,
    ) -> MetadataResult<HashMap<TagId, Option<TagId>>> {
        let rows: Vec<(Uuid, Option<Uuid>)> = sqlx::query_as(
            r#"
            WITH RECURSIVE chain(id, canonical_tag_id) AS (
                SELECT id, canonical_tag_id FROM tags WHERE id = ?
                UNION
                SELECT tags.id, tags.canonical_tag_id
                FROM tags INNER JOIN chain ON tags.id = chain.canonical_tag_id
            )
            SELECT id, canonical_tag_id FROM chain
            "#,
        )
        .bind(Uuid::from(start))
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, link)| (id.into(), link.map(Into::into)))
            .collect())
    }

    /// The link `id` should store when `proposed` is assigned to it.
    async fn flattened_link(
        conn: &mut SqliteConnection,
        id: TagId,
        proposed: Option<TagId>,
    ) -> MetadataResult<Option<TagId>> {
        let Some(target) = proposed else {
            return Ok(None);
        };
        if target == id {
            return Ok(None);
        }
        require_tag(&mut *conn, target).await?;
        let links = load_chain(&mut *conn, target).await?;
        Ok(flatten(id, Some(target), &links))
    }

    /// Case-insensitive lookup-or-create. The unique `name_key` makes a
    /// concurrent first use resolve to the same row instead of failing.
    async fn find_or_create_in(conn: &mut SqliteConnection, name: &str) -> MetadataResult<TagRow> {
        let name = validate_name(name)?;
        let key = normalize_name_key(name);

        let inserted = sqlx::query(
            "INSERT INTO tags (id, name, name_key, canonical_tag_id, created_at) \
             VALUES (?, ?, ?, NULL, ?) ON CONFLICT(name_key) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&key)
        .bind(now())
        .execute(&mut *conn)
        .await?;
        if inserted.rows_affected() > 0 {
            tracing::debug!(tag = name, "Created tag");
        }

        let row = sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE name_key = ?")
            .bind(&key)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row)
    }

    async fn tags_for_in(
        conn: &mut SqliteConnection,
        taggable_type: &str,
        taggable_id: Uuid,
    ) -> MetadataResult<Vec<Tag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT tags.* FROM tags \
             INNER JOIN taggings ON taggings.tag_id = tags.id \
             WHERE taggings.taggable_type = ? AND taggings.taggable_id = ? \
             ORDER BY taggings.rowid",
        )
        .bind(taggable_type)
        .bind(taggable_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    impl SqliteStore {
        async fn fetch_counts(&self, query: &QuerySpec) -> MetadataResult<Vec<TagCount>> {
            let rendered = render(query);
            let rows = self
                .timed(
                    bind_values(
                        sqlx::query_as::<Sqlite, TagCountRow>(&rendered.sql),
                        &rendered.params,
                    )
                    .fetch_all(&self.pool),
                )
                .await?;
            Ok(rows.into_iter().map(TagCount::from).collect())
        }
    }

    #[async_trait]
    impl TagRepo for SqliteStore {
        async fn create_tag(&self, name: &str, canonical: Option<TagId>) -> MetadataResult<Tag> {
            let name = validate_name(name)?;
            let key = normalize_name_key(name);

            let mut tx = self.pool.begin().await?;
            let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE name_key = ?")
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await?;
            if taken.is_some() {
                return Err(MetadataError::Validation(format!(
                    "tag name '{name}' is already taken"
                )));
            }

            let id = TagId::new();
            let link = flattened_link(&mut tx, id, canonical).await?;
            sqlx::query(
                "INSERT INTO tags (id, name, name_key, canonical_tag_id, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::from(id))
            .bind(name)
            .bind(&key)
            .bind(link.map(Uuid::from))
            .bind(now())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            Ok(Tag {
                id,
                name: name.to_string(),
                canonical_tag_id: link,
            })
        }

        async fn find_or_create_tag(&self, name: &str) -> MetadataResult<Tag> {
            let mut conn = self.pool.acquire().await?;
            let row = find_or_create_in(&mut conn, name).await?;
            Ok(row.into())
        }

        async fn get_tag(&self, id: TagId) -> MetadataResult<Option<Tag>> {
            let row = sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE id = ?")
                .bind(Uuid::from(id))
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Tag::from))
        }

        async fn find_tag_by_name(&self, name: &str) -> MetadataResult<Option<Tag>> {
            let key = normalize_name_key(name);
            if key.is_empty() {
                return Ok(None);
            }
            let row = sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE name_key = ?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Tag::from))
        }

        async fn find_tags_by_names(&self, names: &[String]) -> MetadataResult<Vec<Tag>> {
            let mut seen = HashSet::new();
            let keys: Vec<String> = names
                .iter()
                .map(|name| normalize_name_key(name))
                .filter(|key| !key.is_empty() && seen.insert(key.clone()))
                .collect();
            if keys.is_empty() {
                return Ok(Vec::new());
            }

            let placeholders = vec!["?"; keys.len()].join(", ");
            let sql = format!("SELECT * FROM tags WHERE name_key IN ({placeholders})");
            let mut query = sqlx::query_as::<_, TagRow>(&sql);
            for key in &keys {
                query = query.bind(key.as_str());
            }
            let rows = query.fetch_all(&self.pool).await?;

            let mut by_key: HashMap<String, TagRow> = rows
                .into_iter()
                .map(|row| (row.name_key.clone(), row))
                .collect();
            Ok(keys
                .iter()
                .filter_map(|key| by_key.remove(key))
                .map(Tag::from)
                .collect())
        }

        async fn rename_tag(&self, id: TagId, name: &str) -> MetadataResult<Tag> {
            let name = validate_name(name)?;
            let key = normalize_name_key(name);

            let mut tx = self.pool.begin().await?;
            let taken: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM tags WHERE name_key = ? AND id <> ?")
                    .bind(&key)
                    .bind(Uuid::from(id))
                    .fetch_optional(&mut *tx)
                    .await?;
            if taken.is_some() {
                return Err(MetadataError::Validation(format!(
                    "tag name '{name}' is already taken"
                )));
            }

            let result = sqlx::query("UPDATE tags SET name = ?, name_key = ? WHERE id = ?")
                .bind(name)
                .bind(&key)
                .bind(Uuid::from(id))
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("tag {id} not found")));
            }

            let row = require_tag(&mut tx, id).await?;
            tx.commit().await?;
            Ok(row.into())
        }

        async fn set_canonical_tag(
            &self,
            id: TagId,
            canonical: Option<TagId>,
        ) -> MetadataResult<Tag> {
            let mut tx = self.pool.begin().await?;
            require_tag(&mut tx, id).await?;

            let link = flattened_link(&mut tx, id, canonical).await?;
            sqlx::query("UPDATE tags SET canonical_tag_id = ? WHERE id = ?")
                .bind(link.map(Uuid::from))
                .bind(Uuid::from(id))
                .execute(&mut *tx)
                .await?;

            // Synonyms of a tag that stops being canonical follow it to the root.
            if let Some(root) = link {
                let moved = sqlx::query("UPDATE tags SET canonical_tag_id = ? WHERE canonical_tag_id = ?")
                    .bind(Uuid::from(root))
                    .bind(Uuid::from(id))
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                if moved > 0 {
                    tracing::debug!(
                        tag_id = %id,
                        canonical_tag_id = %root,
                        synonyms = moved,
                        "Re-pointed synonyms at new canonical tag"
                    );
                }
            }

            let row = require_tag(&mut tx, id).await?;
            tx.commit().await?;
            Ok(row.into())
        }

        async fn synonyms(&self, id: TagId) -> MetadataResult<Vec<Tag>> {
            let rows = sqlx::query_as::<_, TagRow>(
                "SELECT * FROM tags WHERE canonical_tag_id = ? ORDER BY name_key",
            )
            .bind(Uuid::from(id))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(Tag::from).collect())
        }

        async fn delete_tag(&self, id: TagId) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let promoted = sqlx::query("UPDATE tags SET canonical_tag_id = NULL WHERE canonical_tag_id = ?")
                .bind(Uuid::from(id))
                .execute(&mut *tx)
                .await?
                .rows_affected();
            let unlinked = sqlx::query("DELETE FROM taggings WHERE tag_id = ?")
                .bind(Uuid::from(id))
                .execute(&mut *tx)
                .await?
                .rows_affected();
            let result = sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(Uuid::from(id))
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("tag {id} not found")));
            }

            tx.commit().await?;
            tracing::debug!(tag_id = %id, promoted, unlinked, "Deleted tag");
            Ok(())
        }

        async fn list_tags(&self) -> MetadataResult<Vec<Tag>> {
            let rows = sqlx::query_as::<_, TagRow>("SELECT * FROM tags ORDER BY name_key")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(Tag::from).collect())
        }

        async fn tags_used_by(&self, taggable_type: &str) -> MetadataResult<Vec<Tag>> {
            let rows = sqlx::query_as::<_, TagRow>(
                "SELECT DISTINCT tags.* FROM tags \
                 INNER JOIN taggings ON taggings.tag_id = tags.id \
                 WHERE taggings.taggable_type = ? \
                 ORDER BY tags.name_key",
            )
            .bind(taggable_type)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(Tag::from).collect())
        }
    }

    #[async_trait]
    impl TaggingRepo for SqliteStore {
        async fn tags_for(&self, taggable: &TaggableRef) -> MetadataResult<Vec<Tag>> {
            let mut conn = self.pool.acquire().await?;
            tags_for_in(&mut conn, &taggable.taggable_type, taggable.taggable_id).await
        }

        async fn canonical_tags_for(&self, taggable: &TaggableRef) -> MetadataResult<Vec<Tag>> {
            let rows = sqlx::query_as::<_, TagRow>(
                "SELECT DISTINCT canonical.* FROM taggings \
                 INNER JOIN tags AS linked ON linked.id = taggings.tag_id \
                 INNER JOIN tags AS canonical \
                     ON canonical.id = COALESCE(linked.canonical_tag_id, linked.id) \
                 WHERE taggings.taggable_type = ? AND taggings.taggable_id = ? \
                 ORDER BY canonical.name_key",
            )
            .bind(&taggable.taggable_type)
            .bind(taggable.taggable_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(Tag::from).collect())
        }

        async fn sync_tags(
            &self,
            kind: &TaggableType,
            taggable_id: Uuid,
            desired: &TagList,
            options: SyncOptions,
        ) -> MetadataResult<SyncReport> {
            let mut tx = self.pool.begin().await?;

            if let Some(column) = kind.cached_tag_list_column() {
                let sql = format!(
                    "UPDATE {} SET {} = ? WHERE {} = ?",
                    kind.table(),
                    column,
                    kind.primary_key()
                );
                sqlx::query(&sql)
                    .bind(desired.to_string())
                    .bind(taggable_id)
                    .execute(&mut *tx)
                    .await?;
            }

            let current = tags_for_in(&mut tx, kind.name(), taggable_id).await?;
            let diff = TagDiff::compute(&current, desired);
            let mut report = SyncReport::default();

            for tag in diff.to_remove {
                sqlx::query(
                    "DELETE FROM taggings WHERE taggable_type = ? AND taggable_id = ? AND tag_id = ?",
                )
                .bind(kind.name())
                .bind(taggable_id)
                .bind(Uuid::from(tag.id))
                .execute(&mut *tx)
                .await?;
                report.removed.push(tag);
            }

            for name in &diff.to_add {
                let row = find_or_create_in(&mut tx, name).await?;
                sqlx::query(
                    "INSERT INTO taggings (id, taggable_type, taggable_id, tag_id, created_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4())
                .bind(kind.name())
                .bind(taggable_id)
                .bind(row.id)
                .bind(now())
                .execute(&mut *tx)
                .await?;
                report.added.push(row.into());
            }

            if options.destroy_unused {
                for tag in &report.removed {
                    let id = Uuid::from(tag.id);
                    let deleted = sqlx::query(
                        "DELETE FROM tags WHERE id = ? \
                         AND NOT EXISTS (SELECT 1 FROM taggings WHERE tag_id = ?) \
                         AND NOT EXISTS (SELECT 1 FROM tags AS synonyms WHERE synonyms.canonical_tag_id = ?)",
                    )
                    .bind(id)
                    .bind(id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                    if deleted > 0 {
                        report.pruned.push(tag.clone());
                    }
                }
            }

            tx.commit().await?;

            tracing::debug!(
                taggable_type = kind.name(),
                taggable_id = %taggable_id,
                added = report.added.len(),
                removed = report.removed.len(),
                pruned = report.pruned.len(),
                "Synchronized tag list"
            );
            Ok(report)
        }

        async fn delete_taggings_for(&self, taggable: &TaggableRef) -> MetadataResult<u64> {
            let result =
                sqlx::query("DELETE FROM taggings WHERE taggable_type = ? AND taggable_id = ?")
                    .bind(&taggable.taggable_type)
                    .bind(taggable.taggable_id)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl TagQueryRepo for SqliteStore {
        async fn find_tagged_with(
            &self,
            kind: &TaggableType,
            tags: &TagInput,
            options: &FindOptions,
        ) -> MetadataResult<Vec<Uuid>> {
            options.validate()?;
            let tags = self.resolve_tags(tags).await?;
            let Some(query) = TagQueryCompiler::new(kind).find_tagged_with(&tags, options)? else {
                return Ok(Vec::new());
            };

            let rendered = render(&query);
            let rows = self
                .timed(
                    bind_values(
                        sqlx::query_as::<Sqlite, (Uuid,)>(&rendered.sql),
                        &rendered.params,
                    )
                    .fetch_all(&self.pool),
                )
                .await?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        }

        async fn tag_counts(
            &self,
            kind: &TaggableType,
            options: &CountOptions,
        ) -> MetadataResult<Vec<TagCount>> {
            let query = TagQueryCompiler::new(kind).tag_counts(options)?;
            self.fetch_counts(&query).await
        }

        async fn tag_counts_for(
            &self,
            kind: &TaggableType,
            taggable_id: Uuid,
            options: &CountOptions,
        ) -> MetadataResult<Vec<TagCount>> {
            options.validate()?;
            let tags = self.tags_for(&kind.entity(taggable_id)).await?;
            match TagQueryCompiler::new(kind).tag_counts_among(&tags, options)? {
                Some(query) => self.fetch_counts(&query).await,
                None => Ok(Vec::new()),
            }
        }

        async fn find_related_tags(
            &self,
            kind: &TaggableType,
            tags: &TagInput,
            options: &CountOptions,
        ) -> MetadataResult<Vec<TagCount>> {
            options.validate()?;
            let tags = self.resolve_tags(tags).await?;
            match TagQueryCompiler::new(kind).related_tags(&tags, options)? {
                Some(query) => self.fetch_counts(&query).await,
                None => Ok(Vec::new()),
            }
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Tags; name_key is the trimmed, lowercased name
CREATE TABLE IF NOT EXISTS tags (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    canonical_tag_id BLOB REFERENCES tags(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    CHECK (canonical_tag_id IS NULL OR canonical_tag_id <> id)
);
CREATE INDEX IF NOT EXISTS idx_tags_canonical ON tags(canonical_tag_id);

-- Taggings link host rows to tags
CREATE TABLE IF NOT EXISTS taggings (
    id BLOB PRIMARY KEY,
    taggable_type TEXT NOT NULL,
    taggable_id BLOB NOT NULL,
    tag_id BLOB NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_taggings_taggable ON taggings(taggable_type, taggable_id);
CREATE INDEX IF NOT EXISTS idx_taggings_tag ON taggings(tag_id);
CREATE INDEX IF NOT EXISTS idx_taggings_created ON taggings(created_at);
"#;
