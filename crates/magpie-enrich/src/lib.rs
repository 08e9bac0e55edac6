//! # magpie-enrich
//!
//! AI enrichment for fetched posts: builds a fixed prompt, invokes a local
//! Ollama model once, and parses the structured two-field response into a
//! bookmark title and summary.

pub mod enricher;

pub use enricher::{Enricher, Summarizer};
