//! # magpie-core
//!
//! Core types, traits, and abstractions for the magpie bookmark enricher.
//!
//! This crate provides the foundational data structures, the closed failure
//! taxonomy that drives retry policy, and the shared default constants that
//! other magpie crates depend on.

pub mod defaults;
pub mod error;
pub mod models;
pub mod platform;

// Re-export commonly used types at crate root
pub use error::{Error, FailureKind, Result};
pub use models::{BackoffState, BookmarkCandidate, Enrichment, PostContent};
pub use platform::{extract_author, extract_post_id, is_placeholder_title, is_platform_url};
