//! # magpie-client
//!
//! HTTP client for the bookmark service consumed by magpie: the cursor-based
//! sync feed the pipeline reads from, and the edit call it writes enrichment
//! results to.

pub mod api;

pub use api::{BookmarkApi, HttpBookmarkApi, SyncResponse};
