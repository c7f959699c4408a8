//! SQLite rendering of compiled tag queries.

use sqlx::Sqlite;
use sqlx::query::QueryAs;
use sqlx::sqlite::SqliteArguments;
use taglink_core::query::{CmpOp, Column, Expr, Join, Predicate, QuerySpec, Value};
use time::{OffsetDateTime, UtcOffset};

/// SQL text with `?` placeholders and the values to bind, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Render a query spec as SQLite SQL.
pub fn render(query: &QuerySpec) -> RenderedQuery {
    let mut renderer = Renderer::default();
    renderer.query(query);
    RenderedQuery {
        sql: renderer.sql,
        params: renderer.params,
    }
}

/// Timestamps are stored in UTC with whole seconds so their RFC 3339 text
/// compares in time order. Instants with no UTC representation keep their
/// offset; `CountOptions::validate` rejects them before they get here.
pub(crate) fn sql_timestamp(at: OffsetDateTime) -> OffsetDateTime {
    let at = at.checked_to_offset(UtcOffset::UTC).unwrap_or(at);
    at - time::Duration::nanoseconds(i64::from(at.nanosecond()))
}

/// Bind rendered parameters onto a query in placeholder order.
pub(crate) fn bind_values<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &'q [Value],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for value in params {
        query = match value {
            Value::Uuid(id) => query.bind(*id),
            Value::Text(text) => query.bind(text.as_str()),
            Value::Timestamp(at) => query.bind(sql_timestamp(*at)),
            Value::Int(n) => query.bind(*n),
        };
    }
    query
}

#[derive(Default)]
struct Renderer {
    sql: String,
    params: Vec<Value>,
}

impl Renderer {
    fn query(&mut self, query: &QuerySpec) {
        self.sql.push_str("SELECT ");
        if query.distinct {
            self.sql.push_str("DISTINCT ");
        }
        for (i, projection) in query.projection.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.expr(&projection.expr);
            if let Some(alias) = &projection.alias {
                self.sql.push_str(" AS ");
                self.sql.push_str(alias);
            }
        }

        self.sql.push_str(" FROM ");
        self.table(&query.from.table, &query.from.alias);

        for join in &query.joins {
            match join {
                Join::Inner { table, alias, on } => {
                    self.sql.push_str(" INNER JOIN ");
                    self.table(table, alias);
                    self.sql.push_str(" ON ");
                    self.conjunction(on);
                }
                Join::Raw(sql) => {
                    self.sql.push(' ');
                    self.sql.push_str(sql);
                }
            }
        }

        if !query.filter.is_empty() {
            self.sql.push_str(" WHERE ");
            self.conjunction(&query.filter);
        }

        if !query.group_by.is_empty() {
            self.sql.push_str(" GROUP BY ");
            for (i, expr) in query.group_by.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.expr(expr);
            }
        }

        if !query.having.is_empty() {
            self.sql.push_str(" HAVING ");
            self.conjunction(&query.having);
        }

        if let Some(order) = &query.order {
            self.sql.push_str(" ORDER BY ");
            self.sql.push_str(order);
        }

        if let Some(limit) = query.limit {
            self.sql.push_str(" LIMIT ?");
            self.params.push(Value::Int(i64::from(limit)));
        }
    }

    fn table(&mut self, table: &str, alias: &str) {
        self.sql.push_str(table);
        if table != alias {
            self.sql.push_str(" AS ");
            self.sql.push_str(alias);
        }
    }

    fn conjunction(&mut self, predicates: &[Predicate]) {
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(" AND ");
            }
            self.predicate(predicate);
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Compare(left, op, right) => {
                self.expr(left);
                self.sql.push_str(match op {
                    CmpOp::Eq => " = ",
                    CmpOp::Gt => " > ",
                    CmpOp::Ge => " >= ",
                    CmpOp::Le => " <= ",
                });
                self.expr(right);
            }
            Predicate::InList {
                expr,
                values,
                negated,
            } => {
                // IN () is not valid SQL; an empty list matches nothing.
                if values.is_empty() {
                    self.sql.push_str(if *negated { "1 = 1" } else { "1 = 0" });
                    return;
                }
                self.expr(expr);
                self.sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.placeholder(value.clone());
                }
                self.sql.push(')');
            }
            Predicate::InQuery {
                expr,
                query,
                negated,
            } => {
                self.expr(expr);
                self.sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.query(query);
                self.sql.push(')');
            }
            Predicate::Raw(sql) => {
                self.sql.push('(');
                self.sql.push_str(sql);
                self.sql.push(')');
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Column(column) => self.column(column),
            Expr::CanonicalGroup { tags_alias } => {
                self.sql.push_str(&format!(
                    "COALESCE({tags_alias}.canonical_tag_id, {tags_alias}.id)"
                ));
            }
            Expr::Value(value) => self.placeholder(value.clone()),
            Expr::CountDistinct(column) => {
                self.sql.push_str("COUNT(DISTINCT ");
                self.column(column);
                self.sql.push(')');
            }
        }
    }

    fn column(&mut self, column: &Column) {
        self.sql.push_str(&column.table);
        self.sql.push('.');
        self.sql.push_str(&column.name);
    }

    fn placeholder(&mut self, value: Value) {
        self.sql.push('?');
        self.params.push(value);
    }
}
