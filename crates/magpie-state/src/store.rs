//! Persistent state document and the shared retry decision.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use magpie_core::{defaults, BackoffState, Error, FailureKind, Result};

/// Retry bookkeeping for a single URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRecord {
    pub attempts: u32,
    /// RFC 3339 timestamp of the most recent attempt.
    pub last_attempt: String,
    pub error_type: FailureKind,
    pub bookmark_id: i64,
}

/// A permanently failed bookmark. Never retried automatically again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecord {
    pub url: String,
    pub bookmark_id: i64,
    pub attempts: u32,
    pub last_error: FailureKind,
    /// RFC 3339 timestamp of promotion.
    pub failed_at: String,
}

/// Outcome of recording a failure against a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The URL stays in the retry queue; `attempts` so far.
    Retry { attempts: u32 },
    /// The URL was promoted to the permanent failure list.
    Exhausted { attempts: u32 },
}

/// Complete pipeline state.
///
/// The schema carries an explicit version so a future layout change can be
/// detected at load time instead of mis-parsing silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub retries: HashMap<String, RetryRecord>,
    #[serde(default)]
    pub failed: Vec<FailedRecord>,
    #[serde(default)]
    pub backoff: BackoffState,
}

fn default_version() -> u32 {
    defaults::STATE_SCHEMA_VERSION
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: defaults::STATE_SCHEMA_VERSION,
            cursor: None,
            last_updated: None,
            retries: HashMap::new(),
            failed: Vec::new(),
            backoff: BackoffState::default(),
        }
    }
}

impl State {
    /// Record a failure for `url` and decide its fate.
    ///
    /// `not_found` promotes immediately — deleted content will not come
    /// back. Other kinds increment the URL's record and promote once the
    /// kind's attempt cap is reached. Persisted attempt counts are
    /// cumulative across restarts.
    pub fn record_failure(
        &mut self,
        url: &str,
        bookmark_id: i64,
        kind: FailureKind,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        let timestamp = now.to_rfc3339();

        if !kind.is_retriable() {
            self.mark_failed(url, bookmark_id, 1, kind, &timestamp);
            return RetryDecision::Exhausted { attempts: 1 };
        }

        let record = self
            .retries
            .entry(url.to_string())
            .or_insert_with(|| RetryRecord {
                attempts: 0,
                last_attempt: timestamp.clone(),
                error_type: kind,
                bookmark_id,
            });
        record.attempts += 1;
        record.last_attempt = timestamp.clone();
        record.error_type = kind;
        let attempts = record.attempts;

        if attempts >= kind.max_attempts() {
            self.mark_failed(url, bookmark_id, attempts, kind, &timestamp);
            return RetryDecision::Exhausted { attempts };
        }

        RetryDecision::Retry { attempts }
    }

    /// Record a success: the URL's retry record is dropped.
    pub fn record_success(&mut self, url: &str) {
        self.retries.remove(url);
    }

    /// Whether the URL has permanently failed.
    pub fn is_failed(&self, url: &str) -> bool {
        self.failed.iter().any(|f| f.url == url)
    }

    /// Current attempt count for a URL (zero when unknown).
    pub fn retry_attempts(&self, url: &str) -> u32 {
        self.retries.get(url).map_or(0, |r| r.attempts)
    }

    fn mark_failed(
        &mut self,
        url: &str,
        bookmark_id: i64,
        attempts: u32,
        kind: FailureKind,
        timestamp: &str,
    ) {
        self.retries.remove(url);
        self.failed.push(FailedRecord {
            url: url.to_string(),
            bookmark_id,
            attempts,
            last_error: kind,
            failed_at: timestamp.to_string(),
        });
    }
}

/// Loads and persists the state document with atomic writes.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state document.
    ///
    /// A missing file is a fresh start; an unreadable or corrupt file is
    /// logged as a warning and also yields a fresh start — losing saved
    /// progress must never prevent the pipeline from running.
    pub fn load(&self) -> State {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting fresh");
                return State::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read state file, starting fresh");
                return State::default();
            }
        };

        match serde_json::from_str::<State>(&raw) {
            Ok(state) if state.version == defaults::STATE_SCHEMA_VERSION => {
                debug!(
                    path = %self.path.display(),
                    retries = state.retries.len(),
                    failed = state.failed.len(),
                    "State loaded"
                );
                state
            }
            Ok(state) => {
                warn!(
                    found = state.version,
                    expected = defaults::STATE_SCHEMA_VERSION,
                    "State schema version mismatch, starting fresh"
                );
                State::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt state file, starting fresh");
                State::default()
            }
        }
    }

    /// Persist the state document atomically.
    ///
    /// The new content is written to a temporary file in the same directory
    /// and renamed into place, so a crash mid-write leaves the previous
    /// document intact.
    pub fn save(&self, state: &mut State) -> Result<()> {
        state.last_updated = Some(Utc::now().to_rfc3339());

        let json = serde_json::to_string_pretty(state)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), json.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| Error::State(format!("could not replace state file: {e}")))?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // ==========================================================================
    // Retry Decision Tests
    // ==========================================================================

    #[test]
    fn test_not_found_fails_after_single_attempt() {
        let mut state = State::default();
        let decision =
            state.record_failure("https://x.com/a/status/1", 1, FailureKind::NotFound, now());

        assert_eq!(decision, RetryDecision::Exhausted { attempts: 1 });
        assert!(state.is_failed("https://x.com/a/status/1"));
        assert!(state.retries.is_empty(), "not_found must never enter retries");
    }

    #[test]
    fn test_network_promotes_after_three_attempts() {
        let mut state = State::default();
        let url = "https://x.com/a/status/1";

        assert_eq!(
            state.record_failure(url, 1, FailureKind::Network, now()),
            RetryDecision::Retry { attempts: 1 }
        );
        assert_eq!(
            state.record_failure(url, 1, FailureKind::Network, now()),
            RetryDecision::Retry { attempts: 2 }
        );
        assert_eq!(
            state.record_failure(url, 1, FailureKind::Network, now()),
            RetryDecision::Exhausted { attempts: 3 }
        );

        assert!(state.is_failed(url));
        assert!(!state.retries.contains_key(url));
        assert_eq!(state.failed[0].attempts, 3);
        assert_eq!(state.failed[0].last_error, FailureKind::Network);
    }

    #[test]
    fn test_success_clears_retry_record() {
        let mut state = State::default();
        let url = "https://x.com/a/status/1";

        state.record_failure(url, 1, FailureKind::Network, now());
        state.record_failure(url, 1, FailureKind::Network, now());
        assert_eq!(state.retry_attempts(url), 2);

        state.record_success(url);
        assert_eq!(state.retry_attempts(url), 0);
        assert!(!state.is_failed(url));
    }

    #[test]
    fn test_later_failure_kind_overwrites_record() {
        let mut state = State::default();
        let url = "https://x.com/a/status/1";

        state.record_failure(url, 1, FailureKind::Network, now());
        state.record_failure(url, 1, FailureKind::Ollama, now());
        assert_eq!(state.retries[url].error_type, FailureKind::Ollama);
    }

    #[test]
    fn test_attempts_accumulate_across_loads() {
        // Persisted attempts are the single source of truth: two failures
        // before a "restart" plus one after must exhaust the cap.
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let url = "https://x.com/a/status/1";

        let mut state = State::default();
        state.record_failure(url, 1, FailureKind::Network, now());
        state.record_failure(url, 1, FailureKind::Network, now());
        store.save(&mut state).unwrap();

        let mut reloaded = store.load();
        assert_eq!(reloaded.retry_attempts(url), 2);
        assert_eq!(
            reloaded.record_failure(url, 1, FailureKind::Network, now()),
            RetryDecision::Exhausted { attempts: 3 }
        );
    }

    // ==========================================================================
    // Store Tests
    // ==========================================================================

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("absent.json"));
        let state = store.load();
        assert!(state.cursor.is_none());
        assert!(state.retries.is_empty());
        assert_eq!(state.version, defaults::STATE_SCHEMA_VERSION);
    }

    #[test]
    fn test_load_corrupt_file_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let state = StateStore::new(&path).load();
        assert!(state.cursor.is_none());
    }

    #[test]
    fn test_load_version_mismatch_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 99, "cursor": "42"}"#).unwrap();

        let state = StateStore::new(&path).load();
        assert!(state.cursor.is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let mut state = State::default();
        state.cursor = Some("1042".to_string());
        state.record_failure("https://x.com/a/status/1", 7, FailureKind::RateLimit, now());
        state.backoff = BackoffState {
            current_delay: 6.0,
            fibonacci_index: 3,
        };
        store.save(&mut state).unwrap();
        assert!(state.last_updated.is_some());

        let loaded = store.load();
        assert_eq!(loaded.cursor.as_deref(), Some("1042"));
        assert_eq!(loaded.retry_attempts("https://x.com/a/status/1"), 1);
        assert_eq!(loaded.backoff.fibonacci_index, 3);
        assert!((loaded.backoff.current_delay - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_interrupted_write_leaves_previous_document_intact() {
        // Simulate a crash between temp-file write and rename: the garbage
        // temp file sits next to the real document, which must still load.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path);

        let mut state = State::default();
        state.cursor = Some("100".to_string());
        store.save(&mut state).unwrap();

        std::fs::write(dir.path().join(".tmpXYZ"), "{\"version\": 1, \"curso").unwrap();

        let loaded = store.load();
        assert_eq!(loaded.cursor.as_deref(), Some("100"));
    }

    #[test]
    fn test_save_replaces_rather_than_appends() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let mut state = State::default();
        state.cursor = Some("1".to_string());
        store.save(&mut state).unwrap();
        state.cursor = Some("2".to_string());
        store.save(&mut state).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.cursor.as_deref(), Some("2"));
    }

    #[test]
    fn test_state_file_in_current_directory() {
        // A bare filename has an empty parent; save must still work.
        let dir = TempDir::new().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let store = StateStore::new("state.json");
        let mut state = State::default();
        let result = store.save(&mut state);

        std::env::set_current_dir(prev).unwrap();
        result.unwrap();
    }

    #[test]
    fn test_failed_record_serializes_kind_as_snake_case() {
        let mut state = State::default();
        state.record_failure("https://x.com/a/status/1", 1, FailureKind::RateLimit, now());
        state.record_failure("https://x.com/a/status/1", 1, FailureKind::RateLimit, now());
        state.record_failure("https://x.com/a/status/1", 1, FailureKind::RateLimit, now());

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"rate_limit\""));
    }
}
