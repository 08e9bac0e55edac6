//! Shared data models for the enrichment pipeline.

use serde::{Deserialize, Serialize};

/// A bookmark read from the feed.
///
/// Not owned by the pipeline — the upstream store is authoritative. The
/// pipeline only inspects `url`, `title`, and `comment`; the remaining
/// fields ride along for logging and are passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkCandidate {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<serde_json::Value>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl BookmarkCandidate {
    /// True when the bookmark has no usable title.
    pub fn title_missing(&self) -> bool {
        self.title.as_deref().map_or(true, |t| t.trim().is_empty())
    }

    /// True when the bookmark has no usable comment.
    pub fn comment_missing(&self) -> bool {
        self.comment
            .as_deref()
            .map_or(true, |c| c.trim().is_empty())
    }

    /// A bookmark needs enrichment while either field is missing.
    pub fn needs_enrichment(&self) -> bool {
        self.title_missing() || self.comment_missing()
    }
}

/// Post content extracted from the target platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PostContent {
    /// Author handle (without the leading @).
    pub author: String,
    /// Post text.
    pub text: String,
    /// Original bookmark URL.
    pub url: String,
    /// Display name, when the source strategy provides one.
    pub author_name: Option<String>,
    pub likes: Option<u64>,
    pub retweets: Option<u64>,
    pub replies: Option<u64>,
    pub views: Option<u64>,
}

impl PostContent {
    /// Create content with only the required fields set.
    pub fn new(
        author: impl Into<String>,
        text: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            url: url.into(),
            author_name: None,
            likes: None,
            retweets: None,
            replies: None,
            views: None,
        }
    }

    /// Render the post as a markdown blockquote for verbose logging.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for line in self.text.lines() {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
        match &self.author_name {
            Some(name) => out.push_str(&format!("\n— {} (@{})", name, self.author)),
            None => out.push_str(&format!("\n— @{}", self.author)),
        }
        out
    }
}

/// Result of a successful enrichment: the fields written back to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub title: String,
    pub comment: String,
}

/// Persisted snapshot of the global fetch backoff.
///
/// A single record shared across all outbound fetches: `current_delay` is
/// zero while operating normally and holds the escalated delay while in the
/// penalty box; `fibonacci_index` is the position in the multiplier table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BackoffState {
    pub current_delay: f64,
    pub fibonacci_index: u32,
}
