//! Configuration from environment variables.
//!
//! The binary loads a `.env` file (via dotenvy) before calling
//! [`Config::from_env`], so every setting can live in either the process
//! environment or a dotfile. Only the bookmark service URL and token are
//! required; everything else has a default from `magpie_core::defaults`.

use std::path::PathBuf;

use magpie_core::{defaults, Error, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bookmark service base URL.
    pub api_url: String,
    /// Bearer token with read+write scope.
    pub api_token: String,
    /// Ollama endpoint.
    pub ollama_base: String,
    /// Ollama generation model.
    pub ollama_model: String,
    /// Normal inter-fetch delay lower bound (seconds).
    pub fetch_min_delay: f64,
    /// Normal inter-fetch delay upper bound (seconds).
    pub fetch_max_delay: f64,
    /// Backoff delay cap (seconds).
    pub fetch_max_backoff: f64,
    /// State document path.
    pub state_file: PathBuf,
    /// Feed batch size per sync read.
    pub sync_limit: u32,
}

fn var_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("MAGPIE_API_URL")
            .map_err(|_| Error::Config("MAGPIE_API_URL is required".into()))?;
        let api_token = std::env::var("MAGPIE_API_TOKEN")
            .map_err(|_| Error::Config("MAGPIE_API_TOKEN is required".into()))?;

        let config = Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
            ollama_base: std::env::var("OLLAMA_BASE")
                .unwrap_or_else(|_| defaults::OLLAMA_URL.to_string()),
            ollama_model: std::env::var("OLLAMA_GEN_MODEL")
                .unwrap_or_else(|_| defaults::GEN_MODEL.to_string()),
            fetch_min_delay: var_f64("MAGPIE_FETCH_MIN_DELAY", defaults::FETCH_MIN_DELAY_SECS),
            fetch_max_delay: var_f64("MAGPIE_FETCH_MAX_DELAY", defaults::FETCH_MAX_DELAY_SECS),
            fetch_max_backoff: var_f64("MAGPIE_FETCH_MAX_BACKOFF", defaults::FETCH_MAX_BACKOFF_SECS),
            state_file: std::env::var("MAGPIE_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::STATE_FILE)),
            sync_limit: std::env::var("MAGPIE_SYNC_LIMIT")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults::SYNC_LIMIT)
                .clamp(1, 100),
        };

        if config.fetch_min_delay > config.fetch_max_delay {
            return Err(Error::Config(format!(
                "MAGPIE_FETCH_MIN_DELAY ({}) exceeds MAGPIE_FETCH_MAX_DELAY ({})",
                config.fetch_min_delay, config.fetch_max_delay
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-wide, so everything lives in a single
    // test to avoid racing parallel test threads.
    #[test]
    fn test_from_env_round_trip() {
        std::env::set_var("MAGPIE_API_URL", "https://bookmarks.example.com/");
        std::env::set_var("MAGPIE_API_TOKEN", "secret");
        std::env::set_var("MAGPIE_FETCH_MIN_DELAY", "0.5");
        std::env::set_var("MAGPIE_FETCH_MAX_DELAY", "2.5");
        std::env::set_var("MAGPIE_SYNC_LIMIT", "500");

        let config = Config::from_env().unwrap();
        // Trailing slash trimmed, required fields picked up
        assert_eq!(config.api_url, "https://bookmarks.example.com");
        assert_eq!(config.api_token, "secret");
        // Unset vars fall back to defaults
        assert_eq!(config.ollama_model, defaults::GEN_MODEL);
        assert_eq!(config.state_file, PathBuf::from(defaults::STATE_FILE));
        // Parsed overrides apply, limit clamped into the API's 1-100 range
        assert!((config.fetch_min_delay - 0.5).abs() < f64::EPSILON);
        assert!((config.fetch_max_delay - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.sync_limit, 100);

        // Inverted delay bounds are a configuration error
        std::env::set_var("MAGPIE_FETCH_MIN_DELAY", "9");
        assert!(Config::from_env().is_err());

        std::env::remove_var("MAGPIE_API_URL");
        std::env::remove_var("MAGPIE_API_TOKEN");
        std::env::remove_var("MAGPIE_FETCH_MIN_DELAY");
        std::env::remove_var("MAGPIE_FETCH_MAX_DELAY");
        std::env::remove_var("MAGPIE_SYNC_LIMIT");

        // Missing required vars are a configuration error
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_var_f64_ignores_garbage() {
        std::env::set_var("MAGPIE_TEST_F64", "not-a-number");
        assert!((var_f64("MAGPIE_TEST_F64", 7.0) - 7.0).abs() < f64::EPSILON);
        std::env::remove_var("MAGPIE_TEST_F64");
    }
}
