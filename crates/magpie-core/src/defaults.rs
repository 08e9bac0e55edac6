//! Centralized default constants for magpie.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers. When adding new constants, place them in the appropriate section.

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "qwen3";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for the startup model-availability check in seconds.
pub const MODEL_CHECK_TIMEOUT_SECS: u64 = 5;

/// Sampling temperature for enrichment generations.
pub const GEN_TEMPERATURE: f32 = 0.7;

/// Token cap for enrichment generations.
pub const GEN_NUM_PREDICT: u32 = 500;

/// Maximum length of a generated title in characters.
pub const TITLE_MAX_LENGTH: usize = 100;

// =============================================================================
// BOOKMARK FEED
// =============================================================================

/// Default feed batch size per sync read.
pub const SYNC_LIMIT: u32 = 50;

/// Client timeout for the long-poll sync read in seconds.
pub const SYNC_TIMEOUT_SECS: u64 = 120;

/// Client timeout for bookmark edit writes in seconds.
pub const EDIT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CONTENT FETCH
// =============================================================================

/// Per-request timeout for platform content fetches in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Lower bound of the normal inter-fetch delay in seconds.
pub const FETCH_MIN_DELAY_SECS: f64 = 1.0;

/// Upper bound of the normal inter-fetch delay in seconds.
pub const FETCH_MAX_DELAY_SECS: f64 = 3.0;

/// Cap on the escalated backoff delay in seconds.
pub const FETCH_MAX_BACKOFF_SECS: f64 = 300.0;

/// Browser user agent sent to the platform and its mirrors.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

// =============================================================================
// PIPELINE
// =============================================================================

/// Default state document path.
pub const STATE_FILE: &str = "magpie-state.json";

/// Schema version written into the state document.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Sleep after an unexpected main-loop error in seconds.
pub const LOOP_ERROR_SLEEP_SECS: u64 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_delay_bounds_are_ordered() {
        assert!(FETCH_MIN_DELAY_SECS < FETCH_MAX_DELAY_SECS);
        assert!(FETCH_MAX_DELAY_SECS < FETCH_MAX_BACKOFF_SECS);
    }

    #[test]
    fn sync_timeout_covers_long_poll() {
        // The long-poll read is the dominant suspension point; its client
        // timeout must exceed the edit timeout.
        assert!(SYNC_TIMEOUT_SECS > EDIT_TIMEOUT_SECS);
    }

    #[test]
    fn default_url_is_localhost() {
        assert!(OLLAMA_URL.contains("127.0.0.1"));
    }
}
