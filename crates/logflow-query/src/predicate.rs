//! Typed predicate nodes over log columns.
//!
//! Predicates are rendered to SQL by [`crate::sql`] and evaluated directly
//! against in-memory records by [`Predicate::matches`]. Both paths follow the
//! same null semantics: a comparison against a missing value is false, except
//! for exclusions on a nullable column, which keep the row.

use std::fmt;

use chrono::{DateTime, Utc};
use logflow_core::LogRecord;
use serde::Serialize;
use uuid::Uuid;

/// A filterable column of the log table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Owning tenant
    TenantId,
    /// Event time
    Timestamp,
    /// Severity
    Level,
    /// Source
    Source,
    /// Service, nullable
    Service,
    /// Message text
    Message,
}

impl Column {
    /// The SQL column name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TenantId => "tenant_id",
            Self::Timestamp => "timestamp",
            Self::Level => "level",
            Self::Source => "source",
            Self::Service => "service",
            Self::Message => "message",
        }
    }

    /// Whether the column may hold NULL.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        matches!(self, Self::Service)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bound positional argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// UUID argument
    Uuid(Uuid),
    /// Text argument
    Text(String),
    /// Timestamp argument
    Timestamp(DateTime<Utc>),
    /// Integer argument
    Int(i64),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Direction of a range bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bound {
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
}

/// A single conjunct of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Predicate {
    /// `column = value`
    Eq(Column, SqlValue),
    /// `column <> value`
    NotEq(Column, SqlValue),
    /// `column IN (values)`
    In(Column, Vec<SqlValue>),
    /// `column NOT IN (values)`
    NotIn(Column, Vec<SqlValue>),
    /// Case-insensitive substring match.
    Contains(Column, String),
    /// Negated case-insensitive substring match.
    NotContains(Column, String),
    /// Inclusive range bound.
    Range {
        /// Compared column
        column: Column,
        /// Bound direction
        bound: Bound,
        /// Bound value
        value: SqlValue,
    },
}

/// A column value read from a record.
enum Cell<'a> {
    Uuid(Uuid),
    Time(DateTime<Utc>),
    Text(Option<&'a str>),
}

fn cell<'a>(record: &'a LogRecord, column: Column) -> Cell<'a> {
    match column {
        Column::TenantId => Cell::Uuid(record.tenant_id.as_uuid()),
        Column::Timestamp => Cell::Time(record.timestamp),
        Column::Level => Cell::Text(Some(record.level.as_str())),
        Column::Source => Cell::Text(Some(&record.source)),
        Column::Service => Cell::Text(record.service.as_deref()),
        Column::Message => Cell::Text(Some(&record.message)),
    }
}

/// Equality under SQL semantics; `None` when the cell is NULL.
fn cell_eq(cell: &Cell<'_>, value: &SqlValue) -> Option<bool> {
    match (cell, value) {
        (Cell::Uuid(a), SqlValue::Uuid(b)) => Some(a == b),
        (Cell::Time(a), SqlValue::Timestamp(b)) => Some(a == b),
        (Cell::Text(Some(a)), SqlValue::Text(b)) => Some(*a == b.as_str()),
        (Cell::Text(None), _) => None,
        _ => Some(false),
    }
}

impl Predicate {
    /// The column this predicate constrains.
    #[must_use]
    pub const fn column(&self) -> Column {
        match self {
            Self::Eq(c, _)
            | Self::NotEq(c, _)
            | Self::In(c, _)
            | Self::NotIn(c, _)
            | Self::Contains(c, _)
            | Self::NotContains(c, _) => *c,
            Self::Range { column, .. } => *column,
        }
    }

    /// Evaluates the predicate against a record.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        let cell = cell(record, self.column());
        match self {
            Self::Eq(_, value) => cell_eq(&cell, value).unwrap_or(false),
            Self::NotEq(column, value) => cell_eq(&cell, value)
                .map_or(column.is_nullable(), |eq| !eq),
            Self::In(_, values) => values
                .iter()
                .any(|v| cell_eq(&cell, v).unwrap_or(false)),
            Self::NotIn(column, values) => match cell {
                Cell::Text(None) => column.is_nullable(),
                _ => !values.iter().any(|v| cell_eq(&cell, v).unwrap_or(false)),
            },
            Self::Contains(_, needle) => match cell {
                Cell::Text(Some(text)) => contains_ci(text, needle),
                _ => false,
            },
            Self::NotContains(_, needle) => match cell {
                Cell::Text(Some(text)) => !contains_ci(text, needle),
                _ => false,
            },
            Self::Range { bound, value, .. } => match (&cell, value) {
                (Cell::Time(t), SqlValue::Timestamp(v)) => match bound {
                    Bound::Gte => t >= v,
                    Bound::Lte => t <= v,
                },
                _ => false,
            },
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use logflow_core::{LogLevel, TenantId};

    fn make_test_record(service: Option<&str>) -> LogRecord {
        let mut builder = LogRecord::builder()
            .tenant_id(TenantId::new())
            .source("api")
            .level(LogLevel::Error)
            .message("Upstream Timeout after 30s");
        if let Some(service) = service {
            builder = builder.service(service);
        }
        builder.build().unwrap()
    }

    #[test]
    fn eq_and_in_on_text() {
        let record = make_test_record(None);
        assert!(Predicate::Eq(Column::Level, "ERROR".into()).matches(&record));
        assert!(!Predicate::Eq(Column::Level, "error".into()).matches(&record));
        assert!(Predicate::In(Column::Source, vec!["web".into(), "api".into()]).matches(&record));
        assert!(!Predicate::NotIn(Column::Source, vec!["api".into()]).matches(&record));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let record = make_test_record(None);
        assert!(Predicate::Contains(Column::Message, "timeout".into()).matches(&record));
        assert!(!Predicate::NotContains(Column::Message, "TIMEOUT".into()).matches(&record));
        assert!(Predicate::NotContains(Column::Message, "refused".into()).matches(&record));
    }

    #[test]
    fn contains_treats_like_metacharacters_literally() {
        let record = make_test_record(None);
        assert!(!Predicate::Contains(Column::Message, "%".into()).matches(&record));
        assert!(!Predicate::Contains(Column::Message, "_".into()).matches(&record));
    }

    #[test]
    fn service_exclusion_keeps_null_rows() {
        let without = make_test_record(None);
        let with = make_test_record(Some("billing"));

        let not_eq = Predicate::NotEq(Column::Service, "billing".into());
        assert!(not_eq.matches(&without));
        assert!(!not_eq.matches(&with));

        let not_in = Predicate::NotIn(Column::Service, vec!["billing".into()]);
        assert!(not_in.matches(&without));
        assert!(!not_in.matches(&with));

        assert!(!Predicate::Eq(Column::Service, "billing".into()).matches(&without));
    }

    #[test]
    fn range_on_timestamp() {
        let record = make_test_record(None);
        let before = record.timestamp - chrono::Duration::seconds(1);
        let gte = Predicate::Range {
            column: Column::Timestamp,
            bound: Bound::Gte,
            value: SqlValue::Timestamp(before),
        };
        let lte = Predicate::Range {
            column: Column::Timestamp,
            bound: Bound::Lte,
            value: SqlValue::Timestamp(before),
        };
        assert!(gte.matches(&record));
        assert!(!lte.matches(&record));
    }

    #[test]
    fn tenant_eq_uses_uuid() {
        let record = make_test_record(None);
        let own = Predicate::Eq(Column::TenantId, SqlValue::Uuid(record.tenant_id.as_uuid()));
        let other = Predicate::Eq(Column::TenantId, SqlValue::Uuid(Uuid::new_v4()));
        assert!(own.matches(&record));
        assert!(!other.matches(&record));
    }
}
