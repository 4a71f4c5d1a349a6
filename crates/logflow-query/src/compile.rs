//! Compiles a [`QueryFilter`] into a tenant-scoped [`CompiledQuery`].

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use logflow_core::{LogLevel, LogRecord, TenantId};
use serde::Serialize;

use crate::error::{QueryError, Result};
use crate::filter::{QueryFilter, merge_values, non_blank};
use crate::predicate::{Bound, Column, Predicate, SqlValue};

/// Page size used when the filter has none.
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest accepted page size.
pub const MAX_LIMIT: i64 = 1000;

/// Column a result set is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Event time
    #[default]
    Timestamp,
    /// Level name
    Level,
    /// Source
    Source,
    /// Service; rows without one sort as the largest value
    Service,
}

impl SortField {
    /// Parses a sort field case-insensitively; blank means timestamp.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::Timestamp);
        };
        match raw.to_ascii_lowercase().as_str() {
            "timestamp" => Ok(Self::Timestamp),
            "level" => Ok(Self::Level),
            "source" => Ok(Self::Source),
            "service" => Ok(Self::Service),
            _ => Err(QueryError::InvalidSortField(raw.to_string())),
        }
    }

    /// The column this field sorts by.
    #[must_use]
    pub const fn column(&self) -> Column {
        match self {
            Self::Timestamp => Column::Timestamp,
            Self::Level => Column::Level,
            Self::Source => Column::Source,
            Self::Service => Column::Service,
        }
    }

    fn compare(self, a: &LogRecord, b: &LogRecord) -> Ordering {
        match self {
            Self::Timestamp => a.timestamp.cmp(&b.timestamp),
            Self::Level => a.level.as_str().cmp(b.level.as_str()),
            Self::Source => a.source.cmp(&b.source),
            Self::Service => {
                let key = |r: &LogRecord| (r.service.is_none(), r.service.clone());
                key(a).cmp(&key(b))
            }
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

impl SortOrder {
    /// Parses a sort order case-insensitively; blank means DESC.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::Desc);
        };
        match raw.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(QueryError::InvalidSortOrder(raw.to_string())),
        }
    }

    /// SQL keyword.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering directive; ties are broken by record id in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Sort {
    /// Sort column
    pub field: SortField,
    /// Sort direction
    pub order: SortOrder,
}

impl Sort {
    /// Compares two records under this ordering.
    #[must_use]
    pub fn compare(&self, a: &LogRecord, b: &LogRecord) -> Ordering {
        let ord = self.field.compare(a, b).then_with(|| a.id.cmp(&b.id));
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// Page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Page size, 1..=1000
    pub limit: i64,
    /// Rows skipped
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// A validated, tenant-scoped query.
///
/// The first predicate is always the tenant equality. Fields are private so
/// that nothing outside this module can drop it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    tenant_id: TenantId,
    predicates: Vec<Predicate>,
    sort: Sort,
    pagination: Option<Pagination>,
}

impl CompiledQuery {
    /// Owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Conjoined predicates, tenant equality first.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Ordering directive.
    #[must_use]
    pub const fn sort(&self) -> Sort {
        self.sort
    }

    /// Page window; `None` for bulk deletes.
    #[must_use]
    pub const fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    /// True if the record satisfies every predicate.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }
}

fn text_values(values: Vec<String>) -> Vec<SqlValue> {
    values.into_iter().map(SqlValue::Text).collect()
}

fn level_values(values: Vec<String>) -> Result<Vec<SqlValue>> {
    values
        .into_iter()
        .map(|v| {
            LogLevel::parse(&v)
                .map(|l| SqlValue::Text(l.as_str().to_string()))
                .map_err(|_| QueryError::InvalidLevel(v))
        })
        .collect()
}

/// Pushes `Eq` for one value or `In` for several.
fn push_inclusion(out: &mut Vec<Predicate>, column: Column, mut values: Vec<SqlValue>) {
    match values.len() {
        0 => {}
        1 => out.extend(values.pop().map(|v| Predicate::Eq(column, v))),
        _ => out.push(Predicate::In(column, values)),
    }
}

/// Pushes `NotEq` for one value or `NotIn` for several.
fn push_exclusion(out: &mut Vec<Predicate>, column: Column, mut values: Vec<SqlValue>) {
    match values.len() {
        0 => {}
        1 => out.extend(values.pop().map(|v| Predicate::NotEq(column, v))),
        _ => out.push(Predicate::NotIn(column, values)),
    }
}

fn resolve_start(filter: &QueryFilter, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let mut start = filter.start_time;
    // Later windows overwrite earlier ones: days over hours over minutes.
    let windows: [(&'static str, Option<i64>, fn(i64) -> Option<Duration>); 3] = [
        ("last_minutes", filter.last_minutes, Duration::try_minutes),
        ("last_hours", filter.last_hours, Duration::try_hours),
        ("last_days", filter.last_days, Duration::try_days),
    ];
    for (field, value, unit) in windows {
        let Some(value) = value else { continue };
        let invalid = QueryError::InvalidWindow { field, value };
        if value <= 0 {
            return Err(invalid);
        }
        let computed = unit(value).and_then(|span| now.checked_sub_signed(span));
        start = Some(computed.ok_or(invalid)?);
    }
    Ok(start)
}

fn resolve_pagination(filter: &QueryFilter) -> Result<Pagination> {
    let limit = match filter.limit {
        None => DEFAULT_LIMIT,
        Some(l) if l <= 0 => DEFAULT_LIMIT,
        Some(l) if l > MAX_LIMIT => {
            return Err(QueryError::LimitTooLarge {
                limit: l,
                max: MAX_LIMIT,
            });
        }
        Some(l) => l,
    };
    let offset = filter.offset.unwrap_or(0);
    if offset < 0 {
        return Err(QueryError::NegativeOffset(offset));
    }
    Ok(Pagination { limit, offset })
}

/// Validates `filter` and compiles it for `tenant_id`.
///
/// `now` anchors relative time windows.
///
/// # Errors
///
/// Returns a [`QueryError`] describing the first invalid field.
pub fn compile(filter: &QueryFilter, tenant_id: TenantId, now: DateTime<Utc>) -> Result<CompiledQuery> {
    let pagination = resolve_pagination(filter)?;
    let query = compile_predicates(filter, tenant_id, now)?;
    Ok(CompiledQuery {
        pagination: Some(pagination),
        ..query
    })
}

/// Compiles `filter` for a bulk delete: pagination fields are ignored.
///
/// # Errors
///
/// Returns a [`QueryError`] describing the first invalid field.
pub fn compile_delete(
    filter: &QueryFilter,
    tenant_id: TenantId,
    now: DateTime<Utc>,
) -> Result<CompiledQuery> {
    compile_predicates(filter, tenant_id, now)
}

fn compile_predicates(
    filter: &QueryFilter,
    tenant_id: TenantId,
    now: DateTime<Utc>,
) -> Result<CompiledQuery> {
    if let (Some(start), Some(end)) = (filter.start_time, filter.end_time) {
        if start > end {
            return Err(QueryError::InvalidTimeRange);
        }
    }
    let sort = Sort {
        field: SortField::parse(filter.sort_by.as_deref())?,
        order: SortOrder::parse(filter.sort_order.as_deref())?,
    };

    let mut predicates = vec![Predicate::Eq(
        Column::TenantId,
        SqlValue::Uuid(tenant_id.as_uuid()),
    )];

    push_inclusion(
        &mut predicates,
        Column::Level,
        level_values(merge_values(filter.level.as_ref(), &filter.levels))?,
    );
    push_exclusion(
        &mut predicates,
        Column::Level,
        level_values(merge_values(filter.exclude_level.as_ref(), &filter.exclude_levels))?,
    );
    push_inclusion(
        &mut predicates,
        Column::Source,
        text_values(merge_values(filter.source.as_ref(), &filter.sources)),
    );
    push_exclusion(
        &mut predicates,
        Column::Source,
        text_values(merge_values(filter.exclude_source.as_ref(), &filter.exclude_sources)),
    );
    push_inclusion(
        &mut predicates,
        Column::Service,
        text_values(merge_values(filter.service.as_ref(), &filter.services)),
    );
    push_exclusion(
        &mut predicates,
        Column::Service,
        text_values(merge_values(filter.exclude_service.as_ref(), &filter.exclude_services)),
    );

    if let Some(needle) = non_blank(filter.message.as_ref()) {
        predicates.push(Predicate::Contains(Column::Message, needle.to_string()));
    }
    if let Some(needle) = non_blank(filter.message_not_contains.as_ref()) {
        predicates.push(Predicate::NotContains(Column::Message, needle.to_string()));
    }

    if let Some(start) = resolve_start(filter, now)? {
        predicates.push(Predicate::Range {
            column: Column::Timestamp,
            bound: Bound::Gte,
            value: SqlValue::Timestamp(start),
        });
    }
    if let Some(end) = filter.end_time {
        predicates.push(Predicate::Range {
            column: Column::Timestamp,
            bound: Bound::Lte,
            value: SqlValue::Timestamp(end),
        });
    }

    Ok(CompiledQuery {
        tenant_id,
        predicates,
        sort,
        pagination: None,
    })
}
