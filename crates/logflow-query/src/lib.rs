//! # logflow-query
//!
//! Turns a client [`QueryFilter`] into a tenant-scoped [`CompiledQuery`].
//!
//! - [`compile`] / [`compile_delete`]: Validate and compile a filter
//! - [`Predicate`]: Typed conjuncts over [`Column`]s
//! - [`SqlStatement`]: Parameterized SELECT, COUNT and DELETE renderings
//!
//! The tenant equality is injected by the compiler and is always the first
//! predicate; no filter field can remove or override it.
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use logflow_core::TenantId;
//! use logflow_query::{QueryFilter, compile};
//!
//! let filter = QueryFilter::new().with_level("error").with_source("svc-a");
//! let query = compile(&filter, TenantId::new(), Utc::now()).unwrap();
//!
//! assert_eq!(
//!     query.where_clause().sql,
//!     "tenant_id = $1 AND level = $2 AND source = $3"
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compile;
pub mod error;
pub mod filter;
pub mod predicate;
pub mod sql;

pub use compile::{
    CompiledQuery, DEFAULT_LIMIT, MAX_LIMIT, Pagination, Sort, SortField, SortOrder, compile,
    compile_delete,
};
pub use error::{QueryError, Result};
pub use filter::QueryFilter;
pub use predicate::{Bound, Column, Predicate, SqlValue};
pub use sql::{LOG_TABLE, SqlStatement, escape_like};
