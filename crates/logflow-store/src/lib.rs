//! # logflow-store
//!
//! Persistence for log records.
//!
//! - [`LogStorage`]: Async trait implemented by storage backends
//! - [`MemoryLogStorage`]: In-memory backend that evaluates compiled
//!   predicates directly
//!
//! Reads and deletes take a [`logflow_query::CompiledQuery`], so every
//! operation is confined to a single tenant.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryLogStorage;
pub use traits::LogStorage;
