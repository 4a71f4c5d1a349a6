//! End-to-end integration tests for logflow.
//!
//! These tests exercise the full stack through the HTTP router:
//! - Queued ingestion drained by the consumer loops into storage
//! - Credential caching and revocation
//! - Tenant isolation of reads and deletes
//! - Batch and page size limits

#![cfg(test)]
