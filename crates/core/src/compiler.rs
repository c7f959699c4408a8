//! Compilation of tag queries into [`QuerySpec`]s.
//!
//! Table aliases visible to caller supplied `conditions`, `joins` and `order`:
//!
//! | query              | aliases                                                     |
//! |--------------------|-------------------------------------------------------------|
//! | any-of             | host table, `<table>_taggings`, `<table>_tags`              |
//! | match-all          | host table, `taggings_<n>` (and `tags_<n>` when canonical)  |
//! | exclude            | host table                                                  |
//! | counts             | `tags`, `taggings`, host table (`member_tags` if canonical) |
//! | related tags       | counts aliases plus `source_taggings`, `source_tags`        |
//!
//! Counts expose the aggregate as the output column `count`.

use crate::canonical::canonical_groups;
use crate::options::{CountOptions, FindOptions};
use crate::query::{CmpOp, Column, Expr, Predicate, QuerySpec, Value};
use crate::tag::{Tag, TagId};
use crate::taggable::TaggableType;
use std::collections::HashSet;

/// Tag table name.
pub const TAGS_TABLE: &str = "tags";
/// Tagging join table name.
pub const TAGGINGS_TABLE: &str = "taggings";

/// Output column holding the taggable id in find queries.
pub const TAGGABLE_ID_COLUMN: &str = "taggable_id";
/// Output column holding the aggregate in count queries.
pub const COUNT_COLUMN: &str = "count";

const MEMBER_TAGS: &str = "member_tags";
const USED_TAGS: &str = "used_tags";
const SOURCE_TAGGINGS: &str = "source_taggings";
const SOURCE_TAGS: &str = "source_tags";

/// Compiles tag queries for one taggable type.
#[derive(Clone, Copy, Debug)]
pub struct TagQueryCompiler<'a> {
    kind: &'a TaggableType,
}

impl<'a> TagQueryCompiler<'a> {
    pub fn new(kind: &'a TaggableType) -> Self {
        Self { kind }
    }

    /// Query for the ids of taggables matching `tags`.
    ///
    /// Returns `None` when `tags` is empty: a lookup by no (or only unknown)
    /// tags matches nothing.
    pub fn find_tagged_with(
        &self,
        tags: &[Tag],
        options: &FindOptions,
    ) -> crate::Result<Option<QuerySpec>> {
        options.validate()?;
        let keys = query_keys(tags, options.canonical);
        if keys.is_empty() {
            return Ok(None);
        }

        let host = self.kind.table();
        let mut query = QuerySpec::from(host, host)
            .distinct()
            .select(self.host_id(), Some(TAGGABLE_ID_COLUMN));

        if options.exclude {
            query = query.filter(Predicate::not_in_query(
                self.host_id(),
                self.tagged_ids_subquery(&keys, options.canonical),
            ));
        } else if options.match_all {
            query = self.join_each_tag(query, &keys, options.canonical);
        } else {
            let taggings = format!("{host}_{TAGGINGS_TABLE}");
            let tags_alias = format!("{host}_{TAGS_TABLE}");
            query = query
                .inner_join(TAGGINGS_TABLE, &taggings, self.tagging_on_host(&taggings))
                .inner_join(
                    TAGS_TABLE,
                    &tags_alias,
                    vec![Predicate::eq(
                        Expr::column(&tags_alias, "id"),
                        Expr::column(&taggings, "tag_id"),
                    )],
                )
                .filter(Predicate::in_list(
                    tag_key(&tags_alias, options.canonical),
                    keys,
                ));
        }

        if let Some(conditions) = &options.conditions {
            query = query.filter(Predicate::Raw(conditions.clone()));
        }
        Ok(Some(
            query
                .raw_joins(&options.joins)
                .order(options.order.clone())
                .limit(options.limit),
        ))
    }

    /// Tag frequencies across all taggables of this type.
    pub fn tag_counts(&self, options: &CountOptions) -> crate::Result<QuerySpec> {
        options.validate()?;
        Ok(self.counts_query(options).raw_joins(&options.joins))
    }

    /// Tag frequencies restricted to `tags`, e.g. the tags of one taggable.
    ///
    /// With canonical counting the restriction applies to canonical groups.
    pub fn tag_counts_among(
        &self,
        tags: &[Tag],
        options: &CountOptions,
    ) -> crate::Result<Option<QuerySpec>> {
        options.validate()?;
        let keys = query_keys(tags, options.canonical);
        if keys.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            self.counts_query(options)
                .raw_joins(&options.joins)
                .filter(Predicate::in_list(Expr::column(TAGS_TABLE, "id"), keys)),
        ))
    }

    /// Tags co-occurring with `tags` on some taggable, excluding `tags`
    /// themselves (their canonical groups when counting canonically).
    pub fn related_tags(
        &self,
        tags: &[Tag],
        options: &CountOptions,
    ) -> crate::Result<Option<QuerySpec>> {
        options.validate()?;
        let keys = query_keys(tags, options.canonical);
        if keys.is_empty() {
            return Ok(None);
        }
        let query = self
            .counts_query(options)
            .inner_join(
                TAGGINGS_TABLE,
                SOURCE_TAGGINGS,
                self.tagging_on_host(SOURCE_TAGGINGS),
            )
            .inner_join(
                TAGS_TABLE,
                SOURCE_TAGS,
                vec![Predicate::eq(
                    Expr::column(SOURCE_TAGS, "id"),
                    Expr::column(SOURCE_TAGGINGS, "tag_id"),
                )],
            )
            .raw_joins(&options.joins)
            .filter(Predicate::in_list(
                tag_key(SOURCE_TAGS, options.canonical),
                keys.iter().copied(),
            ))
            .filter(Predicate::not_in_list(Expr::column(TAGS_TABLE, "id"), keys));
        Ok(Some(query))
    }

    /// Aggregate over `tags` joined to taggings of this type, without caller joins.
    fn counts_query(&self, options: &CountOptions) -> QuerySpec {
        let host = self.kind.table();
        let mut query = QuerySpec::from(TAGS_TABLE, TAGS_TABLE);

        let counted_tags = if options.canonical {
            query = query.inner_join(
                TAGS_TABLE,
                MEMBER_TAGS,
                vec![Predicate::eq(
                    Expr::canonical_group(MEMBER_TAGS),
                    Expr::column(TAGS_TABLE, "id"),
                )],
            );
            MEMBER_TAGS
        } else {
            TAGS_TABLE
        };

        query = query
            .inner_join(
                TAGGINGS_TABLE,
                TAGGINGS_TABLE,
                vec![Predicate::eq(
                    Expr::column(TAGGINGS_TABLE, "tag_id"),
                    Expr::column(counted_tags, "id"),
                )],
            )
            .inner_join(host, host, self.tagging_on_host(TAGGINGS_TABLE));

        if let Some(conditions) = &options.conditions {
            query = query.filter(Predicate::Raw(conditions.clone()));
        }
        if let Some(start_at) = options.start_at {
            query = query.filter(Predicate::compare(
                Expr::column(TAGGINGS_TABLE, "created_at"),
                CmpOp::Ge,
                Expr::value(start_at),
            ));
        }
        if let Some(end_at) = options.end_at {
            query = query.filter(Predicate::compare(
                Expr::column(TAGGINGS_TABLE, "created_at"),
                CmpOp::Le,
                Expr::value(end_at),
            ));
        }

        let count = || Expr::CountDistinct(Column::new(TAGGINGS_TABLE, "id"));
        query = query
            .select(Expr::column(TAGS_TABLE, "id"), Some("id"))
            .select(Expr::column(TAGS_TABLE, "name"), Some("name"))
            .select(
                Expr::column(TAGS_TABLE, "canonical_tag_id"),
                Some("canonical_tag_id"),
            )
            .select(count(), Some(COUNT_COLUMN))
            .group_by(Expr::column(TAGS_TABLE, "id"))
            .group_by(Expr::column(TAGS_TABLE, "name"))
            .group_by(Expr::column(TAGS_TABLE, "canonical_tag_id"))
            .having(Predicate::compare(count(), CmpOp::Gt, Expr::Value(Value::Int(0))));

        if let Some(at_least) = options.at_least {
            query = query.having(Predicate::compare(
                count(),
                CmpOp::Ge,
                Expr::Value(Value::Int(clamp_count(at_least))),
            ));
        }
        if let Some(at_most) = options.at_most {
            query = query.having(Predicate::compare(
                count(),
                CmpOp::Le,
                Expr::Value(Value::Int(clamp_count(at_most))),
            ));
        }

        query.order(options.order.clone()).limit(options.limit)
    }

    /// One join per query key; a taggable survives only if every join matches.
    fn join_each_tag(&self, mut query: QuerySpec, keys: &[TagId], canonical: bool) -> QuerySpec {
        for (index, key) in keys.iter().enumerate() {
            let taggings = format!("{TAGGINGS_TABLE}_{index}");
            let mut on = self.tagging_on_host(&taggings);
            if canonical {
                let tags_alias = format!("{TAGS_TABLE}_{index}");
                query = query.inner_join(TAGGINGS_TABLE, &taggings, on).inner_join(
                    TAGS_TABLE,
                    &tags_alias,
                    vec![
                        Predicate::eq(
                            Expr::column(&tags_alias, "id"),
                            Expr::column(&taggings, "tag_id"),
                        ),
                        Predicate::eq(Expr::canonical_group(&tags_alias), Expr::value(*key)),
                    ],
                );
            } else {
                on.push(Predicate::eq(
                    Expr::column(&taggings, "tag_id"),
                    Expr::value(*key),
                ));
                query = query.inner_join(TAGGINGS_TABLE, &taggings, on);
            }
        }
        query
    }

    /// Ids of taggables of this type carrying any of `keys`.
    fn tagged_ids_subquery(&self, keys: &[TagId], canonical: bool) -> QuerySpec {
        QuerySpec::from(TAGGINGS_TABLE, TAGGINGS_TABLE)
            .select(Expr::column(TAGGINGS_TABLE, "taggable_id"), None)
            .inner_join(
                TAGS_TABLE,
                USED_TAGS,
                vec![Predicate::eq(
                    Expr::column(TAGGINGS_TABLE, "tag_id"),
                    Expr::column(USED_TAGS, "id"),
                )],
            )
            .filter(Predicate::in_list(
                tag_key(USED_TAGS, canonical),
                keys.iter().copied(),
            ))
            .filter(Predicate::eq(
                Expr::column(TAGGINGS_TABLE, "taggable_type"),
                Expr::value(self.kind.name()),
            ))
    }

    /// Join condition tying a taggings alias to the host row.
    fn tagging_on_host(&self, taggings: &str) -> Vec<Predicate> {
        vec![
            Predicate::eq(Expr::column(taggings, "taggable_id"), self.host_id()),
            Predicate::eq(
                Expr::column(taggings, "taggable_type"),
                Expr::value(self.kind.name()),
            ),
        ]
    }

    fn host_id(&self) -> Expr {
        Expr::column(self.kind.table(), self.kind.primary_key())
    }
}

/// Identity a tag row is matched on: its id, or its canonical group.
fn tag_key(tags_alias: &str, canonical: bool) -> Expr {
    if canonical {
        Expr::canonical_group(tags_alias)
    } else {
        Expr::column(tags_alias, "id")
    }
}

/// Distinct ids (or canonical groups) of the query tags.
fn query_keys(tags: &[Tag], canonical: bool) -> Vec<TagId> {
    if canonical {
        return canonical_groups(tags);
    }
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.id)
        .filter(|id| seen.insert(*id))
        .collect()
}

fn clamp_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
