//! # magpie-state
//!
//! The pipeline's single durable document: cursor position, per-URL retry
//! records, permanently-failed items, and the global backoff snapshot.
//! Loaded once at startup, mutated in memory, written back atomically after
//! every feed read and on shutdown.

pub mod store;

pub use store::{FailedRecord, RetryDecision, RetryRecord, State, StateStore};
