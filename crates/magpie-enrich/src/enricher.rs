//! Ollama-backed enrichment.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use magpie_core::{defaults, Enrichment, Error, PostContent, Result};

/// Prompt template for post summarization. The model is asked for an exact
/// two-marker format so the response can be parsed mechanically.
const PROMPT_TEMPLATE: &str = "Given the following post content, generate:
1. A brief one-sentence title (max 100 characters) that captures the main topic
2. A 3-5 sentence summary of the content

Post by @{author}:
{text}

Respond in this exact format:
TITLE: <your title here>
SUMMARY: <your summary here>";

/// Title marker line.
static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)TITLE:\s*(.+?)(?:\n|$)").unwrap());

/// Summary marker; captures everything after it.
static SUMMARY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)SUMMARY:\s*(.+)").unwrap());

/// Parse the model response into `(title, summary)`.
///
/// Both markers must be present; a response missing either is unusable and
/// classified as an inference failure by the caller.
pub fn parse_response(response: &str) -> Option<(String, String)> {
    let title = TITLE_PATTERN
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| truncate_title(m.as_str().trim()))?;

    let summary = SUMMARY_PATTERN
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())?;

    if title.is_empty() || summary.is_empty() {
        return None;
    }
    Some((title, summary))
}

/// Enforce the title length cap, ellipsizing on overflow.
fn truncate_title(title: &str) -> String {
    if title.chars().count() <= defaults::TITLE_MAX_LENGTH {
        return title.to_string();
    }
    let head: String = title.chars().take(defaults::TITLE_MAX_LENGTH - 3).collect();
    format!("{head}...")
}

/// Seam for the orchestrator: anything that can enrich post content.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn enrich(&self, content: &PostContent) -> Result<Enrichment>;
}

/// Ollama-based enricher.
pub struct Enricher {
    client: Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl Enricher {
    /// Create an enricher for `model` served at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            timeout_secs: defaults::GEN_TIMEOUT_SECS,
        }
    }

    /// Override the generation timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The configured model name.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Verify the server is reachable and the configured model is pulled.
    ///
    /// Runs once at startup; a failure here is fatal for the process, since
    /// running without a working model would only accumulate failures.
    #[instrument(skip(self), fields(component = "enricher", op = "check_model", model = %self.model))]
    pub async fn check_model(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(defaults::MODEL_CHECK_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| {
                Error::Inference(format!("cannot connect to Ollama at {}: {e}", self.base_url))
            })?;

        if !response.status().is_success() {
            return Err(Error::Inference(format!(
                "Ollama model list returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("unreadable model list: {e}")))?;

        // Model names can be "qwen3", "qwen3:latest", "qwen3:7b", etc.
        let wanted_base = self.model.split(':').next().unwrap_or(&self.model);
        let available = tags.models.iter().any(|m| {
            m.id() == self.model || m.id().split(':').next() == Some(wanted_base)
        });

        if !available {
            let names: Vec<&str> = tags.models.iter().map(ModelEntry::id).collect();
            return Err(Error::Inference(format!(
                "model '{}' not found. Available: {names:?}",
                self.model
            )));
        }

        info!("Ollama model check passed");
        Ok(())
    }
}

#[async_trait]
impl Summarizer for Enricher {
    #[instrument(skip(self, content), fields(component = "enricher", op = "enrich", model = %self.model, text_len = content.text.len()))]
    async fn enrich(&self, content: &PostContent) -> Result<Enrichment> {
        let start = Instant::now();
        let prompt = PROMPT_TEMPLATE
            .replace("{author}", &content.author)
            .replace("{text}", &content.text);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: defaults::GEN_TEMPERATURE,
                num_predict: defaults::GEN_NUM_PREDICT,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("failed to parse response: {e}")))?;

        let text = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = text.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30_000 {
            warn!(duration_ms = elapsed, slow = true, "Slow generation");
        }

        let (title, comment) = parse_response(&text).ok_or_else(|| {
            let preview: String = text.chars().take(200).collect();
            Error::Inference(format!("response missing TITLE/SUMMARY markers: {preview}"))
        })?;

        Ok(Enrichment { title, comment })
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Response from `/api/tags`.
#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

// Newer servers send both `model` and `name`; older ones only `name`.
#[derive(Deserialize)]
struct ModelEntry {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl ModelEntry {
    fn id(&self) -> &str {
        self.model.as_deref().or(self.name.as_deref()).unwrap_or("")
    }
}
