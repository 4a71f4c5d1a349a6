//! The client-facing query filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured filter submitted to the query and bulk-delete endpoints.
///
/// All present fields are conjoined. Empty strings and empty lists are
/// treated as absent. The tenant is never part of the filter; the compiler
/// injects it from the authenticated identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    /// Single level equality.
    pub level: Option<String>,
    /// Level membership.
    pub levels: Vec<String>,
    /// Single level exclusion.
    pub exclude_level: Option<String>,
    /// Level exclusion set.
    pub exclude_levels: Vec<String>,

    /// Single source equality.
    pub source: Option<String>,
    /// Source membership.
    pub sources: Vec<String>,
    /// Single source exclusion.
    pub exclude_source: Option<String>,
    /// Source exclusion set.
    pub exclude_sources: Vec<String>,

    /// Single service equality.
    pub service: Option<String>,
    /// Service membership.
    pub services: Vec<String>,
    /// Single service exclusion; rows without a service are kept.
    pub exclude_service: Option<String>,
    /// Service exclusion set; rows without a service are kept.
    pub exclude_services: Vec<String>,

    /// Case-insensitive substring the message must contain.
    #[serde(alias = "message_contains")]
    pub message: Option<String>,
    /// Case-insensitive substring the message must not contain.
    pub message_not_contains: Option<String>,

    /// Inclusive lower time bound.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub end_time: Option<DateTime<Utc>>,
    /// Relative window in minutes.
    pub last_minutes: Option<i64>,
    /// Relative window in hours.
    pub last_hours: Option<i64>,
    /// Relative window in days.
    pub last_days: Option<i64>,

    /// Page size; absent or non-positive means 100.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: Option<i64>,
    /// One of timestamp, level, source, service.
    pub sort_by: Option<String>,
    /// ASC or DESC.
    pub sort_order: Option<String>,
}

impl QueryFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by a single level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Filters by a single source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Filters by a single service.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Requires the message to contain `needle`.
    #[must_use]
    pub fn with_message(mut self, needle: impl Into<String>) -> Self {
        self.message = Some(needle.into());
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the page offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the sort field and order.
    #[must_use]
    pub fn with_sort(mut self, by: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort_by = Some(by.into());
        self.sort_order = Some(order.into());
        self
    }
}

/// Collects a single value and a list into one list, dropping blanks.
/// Kept values are passed through as submitted.
pub(crate) fn merge_values(single: Option<&String>, many: &[String]) -> Vec<String> {
    single
        .into_iter()
        .chain(many.iter())
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect()
}

/// Returns the value, untrimmed, when it is present and not blank.
pub(crate) fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_message_alias() {
        let filter: QueryFilter = serde_json::from_str(r#"{"message_contains":"timeout"}"#).unwrap();
        assert_eq!(filter.message.as_deref(), Some("timeout"));
    }

    #[test]
    fn deserializes_empty_object() {
        let filter: QueryFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter, QueryFilter::default());
    }

    #[test]
    fn merge_values_drops_blanks() {
        let single = "ERROR".to_string();
        let merged = merge_values(Some(&single), &["  ".to_string(), "warn".to_string()]);
        assert_eq!(merged, vec!["ERROR".to_string(), "warn".to_string()]);
    }

    #[test]
    fn kept_values_are_not_trimmed() {
        let single = " svc-a ".to_string();
        assert_eq!(merge_values(Some(&single), &[]), vec![" svc-a ".to_string()]);

        let needle = " error ".to_string();
        assert_eq!(non_blank(Some(&needle)), Some(" error "));
        assert_eq!(non_blank(Some(&"   ".to_string())), None);
    }
}
