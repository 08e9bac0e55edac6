//! Target-platform URL recognition and extraction helpers.
//!
//! The pipeline only ever enriches bookmarks pointing at a single microblog
//! platform. Recognition covers the bare domain, the `www.` prefix, the
//! mobile subdomains, and the legacy domain the platform migrated from.

use once_cell::sync::Lazy;
use regex::Regex;

/// URL prefixes recognized as the target platform.
static PLATFORM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^https?://(www\.)?x\.com/").unwrap(),
        Regex::new(r"^https?://(www\.)?twitter\.com/").unwrap(),
        Regex::new(r"^https?://mobile\.twitter\.com/").unwrap(),
        Regex::new(r"^https?://m\.twitter\.com/").unwrap(),
    ]
});

/// Pattern to extract the numeric post id from a URL.
static POST_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/status/(\d+)").unwrap());

/// Pattern to extract the author handle from a URL.
static AUTHOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:x\.com|twitter\.com)/([^/]+)/status").unwrap());

/// Check whether a URL points at the target platform.
pub fn is_platform_url(url: &str) -> bool {
    PLATFORM_PATTERNS.iter().any(|p| p.is_match(url))
}

/// Extract the numeric post id from a platform URL.
pub fn extract_post_id(url: &str) -> Option<&str> {
    POST_ID_PATTERN
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Extract the author handle from a platform URL.
pub fn extract_author(url: &str) -> Option<&str> {
    AUTHOR_PATTERN
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Detect titles that carry no information beyond the URL itself.
///
/// Capture clients frequently save a bookmark with the raw link or the
/// platform name as its title; those are treated as missing when deciding
/// which fields to write back.
pub fn is_placeholder_title(title: &str, url: &str) -> bool {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed == url || trimmed == url.trim_end_matches('/') {
        return true;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return true;
    }
    matches!(
        trimmed.to_ascii_lowercase().as_str(),
        "x" | "x.com" | "twitter" | "twitter.com"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_bare_domain() {
        assert!(is_platform_url("https://x.com/user/status/123"));
        assert!(is_platform_url("http://x.com/user/status/123"));
        assert!(is_platform_url("https://twitter.com/user/status/123"));
    }

    #[test]
    fn test_recognizes_www_prefix() {
        assert!(is_platform_url("https://www.x.com/user/status/123"));
        assert!(is_platform_url("https://www.twitter.com/user/status/123"));
    }

    #[test]
    fn test_recognizes_mobile_subdomains() {
        assert!(is_platform_url("https://mobile.twitter.com/user/status/123"));
        assert!(is_platform_url("https://m.twitter.com/user/status/123"));
    }

    #[test]
    fn test_rejects_other_domains() {
        assert!(!is_platform_url("https://example.com/user/status/123"));
        assert!(!is_platform_url("https://xcom.evil.example/"));
        assert!(!is_platform_url("https://notx.com/user/status/123"));
        assert!(!is_platform_url("https://mastodon.social/@user/123"));
    }

    #[test]
    fn test_rejects_lookalike_subdomains() {
        // Only the exact recognized hosts count.
        assert!(!is_platform_url("https://api.twitter.com/user/status/1"));
        assert!(!is_platform_url("https://mobile.x.com/user/status/1"));
    }

    #[test]
    fn test_extract_post_id() {
        assert_eq!(
            extract_post_id("https://x.com/alice/status/1234567890"),
            Some("1234567890")
        );
        assert_eq!(extract_post_id("https://x.com/alice"), None);
    }

    #[test]
    fn test_extract_author() {
        assert_eq!(
            extract_author("https://x.com/alice/status/123"),
            Some("alice")
        );
        assert_eq!(
            extract_author("https://www.twitter.com/bob/status/9"),
            Some("bob")
        );
        assert_eq!(extract_author("https://x.com/alice"), None);
    }

    #[test]
    fn test_placeholder_titles() {
        let url = "https://x.com/alice/status/123";
        assert!(is_placeholder_title("", url));
        assert!(is_placeholder_title("   ", url));
        assert!(is_placeholder_title(url, url));
        assert!(is_placeholder_title("https://x.com/other/status/9", url));
        assert!(is_placeholder_title("X.com", url));
        assert!(is_placeholder_title("Twitter", url));
    }

    #[test]
    fn test_real_titles_are_not_placeholders() {
        let url = "https://x.com/alice/status/123";
        assert!(!is_placeholder_title("Thread on borrow checking", url));
        assert!(!is_placeholder_title("x marks the spot", url));
    }
}
