//! Backend-neutral query specification.
//!
//! The tag query compiler produces a [`QuerySpec`]: a source table, an
//! ordered list of joins, a conjunctive filter, optional grouping with a
//! conjunctive `HAVING`, and ordering/limit. Store implementations render it
//! into their own SQL dialect and bind the [`Value`]s in order.

use crate::tag::TagId;
use time::OffsetDateTime;
use uuid::Uuid;

/// A bound parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Uuid(Uuid),
    Text(String),
    Timestamp(OffsetDateTime),
    Int(i64),
}

impl From<TagId> for Value {
    fn from(id: TagId) -> Self {
        Self::Uuid(id.into())
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<OffsetDateTime> for Value {
    fn from(at: OffsetDateTime) -> Self {
        Self::Timestamp(at)
    }
}

/// A column qualified by a table alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub table: String,
    pub name: String,
}

impl Column {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }
}

/// Scalar expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Column(Column),
    /// Canonical group of the tag row under `tags_alias`:
    /// its `canonical_tag_id` if set, else its own `id`.
    CanonicalGroup { tags_alias: String },
    Value(Value),
    /// `COUNT(DISTINCT column)`.
    CountDistinct(Column),
}

impl Expr {
    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column(Column::new(table, name))
    }

    pub fn canonical_group(tags_alias: impl Into<String>) -> Self {
        Self::CanonicalGroup {
            tags_alias: tags_alias.into(),
        }
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Ge,
    Le,
}

/// Boolean predicate. Lists of predicates are conjunctions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    Compare(Expr, CmpOp, Expr),
    /// Membership in a literal list; `negated` turns it into `NOT IN`.
    InList {
        expr: Expr,
        values: Vec<Value>,
        negated: bool,
    },
    /// Membership in the single-column result of a subquery.
    InQuery {
        expr: Expr,
        query: Box<QuerySpec>,
        negated: bool,
    },
    /// Caller supplied SQL, rendered verbatim in parentheses.
    Raw(String),
}

impl Predicate {
    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::Compare(left, CmpOp::Eq, right)
    }

    pub fn compare(left: Expr, op: CmpOp, right: Expr) -> Self {
        Self::Compare(left, op, right)
    }

    pub fn in_list(expr: Expr, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::InList {
            expr,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in_list(expr: Expr, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::InList {
            expr,
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn not_in_query(expr: Expr, query: QuerySpec) -> Self {
        Self::InQuery {
            expr,
            query: Box::new(query),
            negated: true,
        }
    }
}

/// A join clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Join {
    Inner {
        table: String,
        alias: String,
        on: Vec<Predicate>,
    },
    /// Caller supplied join SQL, rendered verbatim.
    Raw(String),
}

/// A selected expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// Source table of a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

/// A complete select query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    pub distinct: bool,
    pub projection: Vec<Projection>,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub filter: Vec<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Vec<Predicate>,
    pub order: Option<String>,
    pub limit: Option<u32>,
}

impl QuerySpec {
    /// Start a query over `table AS alias`.
    pub fn from(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            distinct: false,
            projection: Vec::new(),
            from: TableRef {
                table: table.into(),
                alias: alias.into(),
            },
            joins: Vec::new(),
            filter: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn select(mut self, expr: Expr, alias: Option<&str>) -> Self {
        self.projection.push(Projection {
            expr,
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn inner_join(
        mut self,
        table: impl Into<String>,
        alias: impl Into<String>,
        on: Vec<Predicate>,
    ) -> Self {
        self.joins.push(Join::Inner {
            table: table.into(),
            alias: alias.into(),
            on,
        });
        self
    }

    pub fn raw_joins(mut self, joins: &[String]) -> Self {
        self.joins.extend(joins.iter().cloned().map(Join::Raw));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having.push(predicate);
        self
    }

    pub fn order(mut self, order: Option<String>) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Aliases introduced by the source table and structured joins.
    pub fn aliases(&self) -> Vec<&str> {
        std::iter::once(self.from.alias.as_str())
            .chain(self.joins.iter().filter_map(|join| match join {
                Join::Inner { alias, .. } => Some(alias.as_str()),
                Join::Raw(_) => None,
            }))
            .collect()
    }
}
