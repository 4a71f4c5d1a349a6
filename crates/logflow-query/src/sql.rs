//! Renders compiled queries to parameterized PostgreSQL.
//!
//! Filter values only ever appear in the argument list; the statement text
//! contains column names, operators and `$n` placeholders.

use serde::Serialize;

use crate::compile::CompiledQuery;
use crate::predicate::{Bound, Predicate, SqlValue};

/// Table holding log records.
pub const LOG_TABLE: &str = "logs";

const SELECT_COLUMNS: &str =
    "id, tenant_id, timestamp, source, level, message, service, fields, raw_message, created_at";

/// A statement with its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlStatement {
    /// Statement text with `$1..$n` placeholders
    pub sql: String,
    /// Arguments in placeholder order
    pub args: Vec<SqlValue>,
}

/// Escapes `%`, `_` and `\` so user input matches literally inside LIKE.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Default)]
struct Binder {
    args: Vec<SqlValue>,
}

impl Binder {
    fn bind(&mut self, value: SqlValue) -> String {
        self.args.push(value);
        format!("${}", self.args.len())
    }

    fn bind_list(&mut self, values: &[SqlValue]) -> String {
        values
            .iter()
            .map(|v| self.bind(v.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Eq(col, v) => format!("{col} = {}", self.bind(v.clone())),
            Predicate::NotEq(col, v) => {
                let cond = format!("{col} <> {}", self.bind(v.clone()));
                nullable(col.is_nullable(), col.as_str(), cond)
            }
            Predicate::In(col, vs) => format!("{col} IN ({})", self.bind_list(vs)),
            Predicate::NotIn(col, vs) => {
                let cond = format!("{col} NOT IN ({})", self.bind_list(vs));
                nullable(col.is_nullable(), col.as_str(), cond)
            }
            Predicate::Contains(col, needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                format!("{col} ILIKE {}", self.bind(SqlValue::Text(pattern)))
            }
            Predicate::NotContains(col, needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                format!("{col} NOT ILIKE {}", self.bind(SqlValue::Text(pattern)))
            }
            Predicate::Range { column, bound, value } => {
                let op = match bound {
                    Bound::Gte => ">=",
                    Bound::Lte => "<=",
                };
                format!("{column} {op} {}", self.bind(value.clone()))
            }
        }
    }
}

fn nullable(is_nullable: bool, column: &str, cond: String) -> String {
    if is_nullable {
        format!("({column} IS NULL OR {cond})")
    } else {
        cond
    }
}

impl CompiledQuery {
    fn render_where(&self) -> (String, Binder) {
        let mut binder = Binder::default();
        let clause = self
            .predicates()
            .iter()
            .map(|p| binder.render(p))
            .collect::<Vec<_>>()
            .join(" AND ");
        (clause, binder)
    }

    /// The WHERE clause body and its arguments.
    #[must_use]
    pub fn where_clause(&self) -> SqlStatement {
        let (sql, binder) = self.render_where();
        SqlStatement {
            sql,
            args: binder.args,
        }
    }

    /// Paginated, ordered SELECT.
    #[must_use]
    pub fn select_sql(&self) -> SqlStatement {
        let (clause, mut binder) = self.render_where();
        let sort = self.sort();
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {LOG_TABLE} WHERE {clause} ORDER BY {} {order}, id {order}",
            sort.field.column(),
            order = sort.order,
        );
        if let Some(page) = self.pagination() {
            let limit = binder.bind(SqlValue::Int(page.limit));
            let offset = binder.bind(SqlValue::Int(page.offset));
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        SqlStatement {
            sql,
            args: binder.args,
        }
    }

    /// COUNT over the same predicate, ignoring pagination.
    #[must_use]
    pub fn count_sql(&self) -> SqlStatement {
        let (clause, binder) = self.render_where();
        SqlStatement {
            sql: format!("SELECT COUNT(*) FROM {LOG_TABLE} WHERE {clause}"),
            args: binder.args,
        }
    }

    /// DELETE over the same predicate, ignoring pagination.
    #[must_use]
    pub fn delete_sql(&self) -> SqlStatement {
        let (clause, binder) = self.render_where();
        SqlStatement {
            sql: format!("DELETE FROM {LOG_TABLE} WHERE {clause}"),
            args: binder.args,
        }
    }
}
