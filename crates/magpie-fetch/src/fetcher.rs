//! Post content fetching with layered strategies.
//!
//! Content is retrieved using strategies tried in order of reliability:
//!
//! 1. **Mirror JSON API** — `api.fxtwitter.com/{user}/status/{id}`, a
//!    third-party mirror returning rich JSON with full text and author
//!    info, no authentication required.
//! 2. **oEmbed API** — the platform's official embedding endpoint,
//!    returning an HTML snippet the post paragraph is parsed out of.
//! 3. **Direct HTML scrape** — fetches the page and reads OpenGraph meta
//!    tags. Often fails because the platform renders client-side; kept as
//!    a last resort.
//!
//! Every raw failure is classified into [`FailureKind`] here, at the one
//! boundary where it is observed. A `not_found` from any strategy stops the
//! chain: deleted content will not come back.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use magpie_core::{defaults, extract_author, extract_post_id, FailureKind, PostContent};

/// A classified fetch failure.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Seam for the orchestrator: anything that can turn a platform URL into
/// post content.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PostContent, FetchFailure>;
}

/// Default mirror API base.
const MIRROR_BASE: &str = "https://api.fxtwitter.com";

/// Default oEmbed base.
const OEMBED_BASE: &str = "https://publish.twitter.com";

/// Pattern to extract the post paragraph from an oEmbed HTML snippet.
static OEMBED_TEXT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p[^>]*>(.*?)</p>").unwrap());

/// Pattern to strip residual HTML tags from extracted text.
static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// OpenGraph description meta tag.
static META_DESCRIPTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s+(?:property="og:description"|name="description")\s+content="([^"]*)""#)
        .unwrap()
});

/// OpenGraph title meta tag.
static META_TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta\s+property="og:title"\s+content="([^"]*)""#).unwrap());

/// Decode the handful of HTML entities the platform emits in meta tags and
/// oEmbed snippets.
fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
}

/// Fetches post content from the target platform.
pub struct PostFetcher {
    client: Client,
    timeout: Duration,
    mirror_base: String,
    oembed_base: String,
}

impl PostFetcher {
    /// Create a fetcher with the default endpoints and timeout.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(defaults::FETCH_TIMEOUT_SECS),
            mirror_base: MIRROR_BASE.to_string(),
            oembed_base: OEMBED_BASE.to_string(),
        }
    }

    /// Override the strategy endpoints (used by tests).
    pub fn with_endpoints(
        mut self,
        mirror_base: impl Into<String>,
        oembed_base: impl Into<String>,
    ) -> Self {
        self.mirror_base = mirror_base.into();
        self.oembed_base = oembed_base.into();
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify a transport-level reqwest error.
    fn classify_transport(e: reqwest::Error, context: &str) -> FetchFailure {
        if e.is_timeout() {
            FetchFailure::new(FailureKind::Network, format!("{context} timed out"))
        } else {
            FetchFailure::new(FailureKind::Network, format!("{context} failed: {e}"))
        }
    }

    /// Strategy 1: mirror JSON API.
    async fn fetch_via_mirror(&self, url: &str) -> Result<PostContent, FetchFailure> {
        let author = extract_author(url).ok_or_else(|| {
            FetchFailure::new(FailureKind::Parse, "could not extract author from URL")
        })?;
        let post_id = extract_post_id(url).ok_or_else(|| {
            FetchFailure::new(FailureKind::Parse, "could not extract post id from URL")
        })?;

        let api_url = format!("{}/{}/status/{}", self.mirror_base, author, post_id);
        let response = self
            .client
            .get(&api_url)
            .header("User-Agent", defaults::USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::classify_transport(e, "mirror request"))?;

        match response.status().as_u16() {
            404 => {
                return Err(FetchFailure::new(
                    FailureKind::NotFound,
                    "post not found via mirror (404)",
                ))
            }
            // The mirror answers 403 when it is itself being throttled.
            429 | 403 => {
                return Err(FetchFailure::new(
                    FailureKind::RateLimit,
                    format!("rate limited by mirror ({})", response.status().as_u16()),
                ))
            }
            200 => {}
            status => {
                return Err(FetchFailure::new(
                    FailureKind::Network,
                    format!("mirror returned status {status}"),
                ))
            }
        }

        let data: MirrorResponse = response
            .json()
            .await
            .map_err(|e| FetchFailure::new(FailureKind::Parse, format!("mirror response: {e}")))?;

        if data.code != 200 {
            return Err(FetchFailure::new(
                FailureKind::NotFound,
                data.message
                    .unwrap_or_else(|| "unknown mirror error".to_string()),
            ));
        }

        let post = data.tweet.ok_or_else(|| {
            FetchFailure::new(FailureKind::Parse, "no post object in mirror response")
        })?;
        if post.text.is_empty() {
            return Err(FetchFailure::new(
                FailureKind::Parse,
                "no text in mirror response",
            ));
        }

        let (screen_name, display_name) = match post.author {
            Some(a) => (a.screen_name.unwrap_or_else(|| author.to_string()), a.name),
            None => (author.to_string(), None),
        };

        Ok(PostContent {
            author: screen_name,
            author_name: display_name,
            text: post.text,
            url: url.to_string(),
            likes: post.likes,
            retweets: post.retweets,
            replies: post.replies,
            views: post.views,
        })
    }

    /// Strategy 2: official oEmbed endpoint.
    async fn fetch_via_oembed(&self, url: &str) -> Result<PostContent, FetchFailure> {
        // oEmbed still prefers the legacy domain.
        let normalized = url.replace("x.com", "twitter.com");
        let api_url = format!("{}/oembed", self.oembed_base);

        let response = self
            .client
            .get(&api_url)
            .query(&[("url", normalized.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::classify_transport(e, "oEmbed request"))?;

        match response.status().as_u16() {
            404 => {
                return Err(FetchFailure::new(
                    FailureKind::NotFound,
                    "post not found via oEmbed (404)",
                ))
            }
            429 => {
                return Err(FetchFailure::new(
                    FailureKind::RateLimit,
                    "rate limited by oEmbed (429)",
                ))
            }
            200 => {}
            status => {
                return Err(FetchFailure::new(
                    FailureKind::Network,
                    format!("oEmbed returned status {status}"),
                ))
            }
        }

        let data: OembedResponse = response
            .json()
            .await
            .map_err(|e| FetchFailure::new(FailureKind::Parse, format!("oEmbed response: {e}")))?;

        let captured = OEMBED_TEXT_PATTERN
            .captures(&data.html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| {
                FetchFailure::new(FailureKind::Parse, "no paragraph in oEmbed HTML")
            })?;

        let text = unescape_html(&TAG_PATTERN.replace_all(captured.as_str(), ""))
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(FetchFailure::new(
                FailureKind::Parse,
                "empty text after parsing oEmbed HTML",
            ));
        }

        Ok(PostContent {
            author: extract_author(url).unwrap_or("unknown").to_string(),
            author_name: data.author_name,
            ..PostContent::new("", text, url)
        })
    }

    /// Strategy 3: direct page fetch reading OpenGraph meta tags.
    async fn fetch_via_html(&self, url: &str) -> Result<PostContent, FetchFailure> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", defaults::USER_AGENT)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::classify_transport(e, "page request"))?;

        match response.status().as_u16() {
            404 => {
                return Err(FetchFailure::new(
                    FailureKind::NotFound,
                    "post not found (404)",
                ))
            }
            429 => {
                return Err(FetchFailure::new(
                    FailureKind::RateLimit,
                    "rate limited by platform (429)",
                ))
            }
            status if status >= 500 => {
                return Err(FetchFailure::new(
                    FailureKind::Network,
                    format!("server error ({status})"),
                ))
            }
            200 => {}
            status => {
                return Err(FetchFailure::new(
                    FailureKind::Network,
                    format!("unexpected status code: {status}"),
                ))
            }
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchFailure::new(FailureKind::Parse, format!("page body: {e}")))?;

        parse_post_from_html(&html, url).ok_or_else(|| {
            FetchFailure::new(FailureKind::Parse, "could not extract post content from HTML")
        })
    }
}

impl Default for PostFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentSource for PostFetcher {
    /// Fetch post content, trying each strategy until one succeeds.
    #[instrument(skip(self), fields(component = "fetcher", op = "fetch"))]
    async fn fetch(&self, url: &str) -> Result<PostContent, FetchFailure> {
        let mirror_err = match self.fetch_via_mirror(url).await {
            Ok(content) => return Ok(content),
            Err(e) if e.kind == FailureKind::NotFound => return Err(e),
            Err(e) => e,
        };
        debug!(error = %mirror_err, "Mirror strategy failed, trying oEmbed");

        let oembed_err = match self.fetch_via_oembed(url).await {
            Ok(content) => return Ok(content),
            Err(e) if e.kind == FailureKind::NotFound => return Err(e),
            Err(e) => e,
        };
        debug!(error = %oembed_err, "oEmbed strategy failed, trying page scrape");

        self.fetch_via_html(url).await
    }
}

/// Parse post content out of a platform page via OpenGraph meta tags.
fn parse_post_from_html(html: &str, url: &str) -> Option<PostContent> {
    let author = extract_author(url).unwrap_or("unknown");

    // og:description usually carries the post text.
    if let Some(m) = META_DESCRIPTION_PATTERN.captures(html).and_then(|c| c.get(1)) {
        let text = unescape_html(m.as_str());
        if text.len() > 10 {
            return Some(PostContent::new(author, text, url));
        }
    }

    // og:title has the format "Author on X: post text".
    if let Some(m) = META_TITLE_PATTERN.captures(html).and_then(|c| c.get(1)) {
        let mut text = unescape_html(m.as_str());
        for marker in [" on X: ", " on Twitter: "] {
            if let Some((_, rest)) = text.split_once(marker) {
                text = rest.to_string();
                break;
            }
        }
        if text.len() > 10 {
            return Some(PostContent::new(author, text, url));
        }
    }

    None
}

#[derive(Deserialize)]
struct MirrorResponse {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tweet: Option<MirrorPost>,
}

#[derive(Deserialize)]
struct MirrorPost {
    #[serde(default)]
    text: String,
    #[serde(default)]
    author: Option<MirrorAuthor>,
    #[serde(default)]
    likes: Option<u64>,
    #[serde(default)]
    retweets: Option<u64>,
    #[serde(default)]
    replies: Option<u64>,
    #[serde(default)]
    views: Option<u64>,
}

#[derive(Deserialize)]
struct MirrorAuthor {
    #[serde(default)]
    screen_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct OembedResponse {
    #[serde(default)]
    html: String,
    #[serde(default)]
    author_name: Option<String>,
}
