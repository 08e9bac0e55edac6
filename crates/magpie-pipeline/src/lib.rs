//! # magpie-pipeline
//!
//! The control loop that ties magpie together: reads batches from the
//! bookmark feed with the persisted cursor, drives each eligible candidate
//! through fetch → enrich → update, applies the shared retry decision and
//! global backoff, and persists state so restarts never lose progress or
//! double-process items.

pub mod config;
pub mod orchestrator;
pub mod shutdown;

pub use config::Config;
pub use orchestrator::{CandidateOutcome, Orchestrator};
