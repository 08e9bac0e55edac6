//! # magpie-fetch
//!
//! Content retrieval from the target platform: a layered fetch strategy
//! chain with single-boundary error classification, and the global
//! Fibonacci backoff that paces every outbound fetch.

pub mod backoff;
pub mod fetcher;

pub use backoff::BackoffPolicy;
pub use fetcher::{ContentSource, FetchFailure, PostFetcher};
