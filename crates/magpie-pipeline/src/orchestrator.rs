//! The pipeline control loop.
//!
//! Candidates move through a fixed per-candidate state machine:
//!
//! ```text
//! Pending → Fetching → {FetchFailed | Fetched}
//! Fetched → Enriching → {EnrichFailed | Enriched}
//! Enriched → Updating → Done
//! ```
//!
//! Both failure states route through the shared retry decision on the
//! state document. Processing is strictly sequential — the backoff and
//! rate-limit policy are global, and only meaningful under sequential
//! access. The cursor advances in memory only after every item of a batch
//! has settled, so a crash mid-batch re-delivers the batch instead of
//! skipping it; eligibility re-checking makes the re-delivery idempotent.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use magpie_client::{BookmarkApi, SyncResponse};
use magpie_core::{
    defaults, is_placeholder_title, is_platform_url, BookmarkCandidate, FailureKind, Result,
};
use magpie_enrich::Summarizer;
use magpie_fetch::{BackoffPolicy, ContentSource};
use magpie_state::{RetryDecision, State, StateStore};

/// How a single candidate settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Fetched, enriched, and written back (or logged, in dry-run mode).
    Enriched,
    /// Failed retriably; the feed will re-deliver it while it remains
    /// eligible upstream.
    Deferred,
    /// Promoted to the permanent failure list.
    Failed,
    /// Ineligible or already permanently failed; no side effects.
    Skipped,
}

/// The pipeline orchestrator.
pub struct Orchestrator<A, F, S> {
    api: A,
    fetcher: F,
    summarizer: S,
    backoff: BackoffPolicy,
    store: StateStore,
    state: State,
    shutdown: watch::Receiver<bool>,
    sync_limit: u32,
    dry_run: bool,
}

impl<A, F, S> Orchestrator<A, F, S>
where
    A: BookmarkApi,
    F: ContentSource,
    S: Summarizer,
{
    /// Assemble the pipeline. The backoff policy resumes from the snapshot
    /// in `state`, so a restart continues an active penalty.
    pub fn new(
        api: A,
        fetcher: F,
        summarizer: S,
        mut backoff: BackoffPolicy,
        store: StateStore,
        state: State,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        backoff.restore(state.backoff);
        Self {
            api,
            fetcher,
            summarizer,
            backoff,
            store,
            state,
            shutdown,
            sync_limit: defaults::SYNC_LIMIT,
            dry_run: false,
        }
    }

    /// Set the feed batch size.
    pub fn with_sync_limit(mut self, limit: u32) -> Self {
        self.sync_limit = limit;
        self
    }

    /// Suppress the sink write, leaving everything else identical.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run until a termination signal is observed.
    ///
    /// Only the long-poll read is cancellable; once a batch is in hand, the
    /// in-flight candidate always runs to completion and shutdown is
    /// observed between candidates.
    pub async fn run(&mut self) -> Result<()> {
        match &self.state.cursor {
            Some(cursor) => info!(%cursor, "Resuming from saved cursor"),
            None => info!("Starting from beginning (no saved cursor)"),
        }

        let mut watcher = self.shutdown.clone();
        loop {
            if *watcher.borrow() {
                break;
            }

            debug!(cursor = ?self.state.cursor, "Syncing bookmark feed");
            let sync_result = tokio::select! {
                _ = watcher.changed() => continue,
                result = self.api.sync(self.state.cursor.as_deref(), self.sync_limit, true) => result,
            };

            let page = match sync_result {
                Ok(page) => page,
                Err(e) => {
                    error!(error = %e, "Feed read failed");
                    tokio::select! {
                        _ = watcher.changed() => {}
                        _ = sleep(Duration::from_secs(defaults::LOOP_ERROR_SLEEP_SECS)) => {}
                    }
                    continue;
                }
            };

            if let Err(e) = self.process_page(page).await {
                error!(error = %e, "Error in main loop");
                tokio::select! {
                    _ = watcher.changed() => {}
                    _ = sleep(Duration::from_secs(defaults::LOOP_ERROR_SLEEP_SECS)) => {}
                }
            }
        }

        self.persist()?;
        info!("Shutdown complete");
        Ok(())
    }

    /// One feed read: pull a batch, then settle it. `run` performs the read
    /// itself so it can stay cancellable.
    #[cfg(test)]
    async fn poll_once(&mut self) -> Result<()> {
        debug!(cursor = ?self.state.cursor, "Syncing bookmark feed");
        let page = self
            .api
            .sync(self.state.cursor.as_deref(), self.sync_limit, true)
            .await?;
        self.process_page(page).await
    }

    /// Settle every candidate of a batch, advance the cursor, persist.
    async fn process_page(&mut self, page: SyncResponse) -> Result<()> {
        if !page.bookmarks.is_empty() {
            info!(count = page.bookmarks.len(), "Feed returned bookmarks");
        }

        let mut completed = true;
        for candidate in &page.bookmarks {
            if self.shutdown_requested() {
                info!("Shutdown requested, stopping after current bookmark");
                completed = false;
                break;
            }
            let outcome = self.process_candidate(candidate).await;
            debug!(bookmark_id = candidate.id, ?outcome, "Candidate settled");
        }

        // The cursor covers "everything already seen" — it may only advance
        // once the whole batch has settled. An interrupted batch is
        // re-delivered on the next run.
        if completed && page.cursor.is_some() {
            self.state.cursor = page.cursor;
        }
        self.persist()
    }

    /// Drive one candidate through fetch → enrich → update.
    #[instrument(skip(self, candidate), fields(bookmark_id = candidate.id, url = %candidate.url))]
    async fn process_candidate(&mut self, candidate: &BookmarkCandidate) -> CandidateOutcome {
        if !is_platform_url(&candidate.url) || !candidate.needs_enrichment() {
            return CandidateOutcome::Skipped;
        }
        if self.state.is_failed(&candidate.url) {
            debug!("Skipping permanently failed URL");
            return CandidateOutcome::Skipped;
        }

        info!("Processing bookmark");

        // ── Fetching ─────────────────────────────────────────────────────
        let delay = self.backoff.current_delay();
        if delay > 0.0 {
            sleep(Duration::from_secs_f64(delay)).await;
        }

        let content = match self.fetcher.fetch(&candidate.url).await {
            Ok(content) => {
                self.backoff.on_success();
                content
            }
            Err(failure) => {
                warn!(error_type = %failure.kind, error = %failure.message, "Fetch failed");
                if failure.kind.affects_backoff() {
                    let new_delay = self.backoff.on_failure();
                    info!(delay_secs = format!("{new_delay:.1}"), "Backoff increased");
                }
                return self.apply_failure(candidate, failure.kind);
            }
        };
        info!(text_len = content.text.len(), "Fetched post content");

        // ── Enriching ────────────────────────────────────────────────────
        let enrichment = match self.summarizer.enrich(&content).await {
            Ok(enrichment) => enrichment,
            Err(e) => {
                warn!(error = %e, "Enrichment failed");
                return self.apply_failure(candidate, FailureKind::Ollama);
            }
        };

        // A title that is just the saved URL carries no information; treat
        // it as missing when deciding which fields to write back.
        let replacing_placeholder = candidate
            .title
            .as_deref()
            .map_or(false, |t| is_placeholder_title(t, &candidate.url));
        let need_title = candidate.title_missing() || replacing_placeholder;
        let need_comment = candidate.comment_missing();

        let title = need_title.then_some(enrichment.title.as_str());
        let comment = need_comment.then_some(enrichment.comment.as_str());

        if let Some(title) = title {
            if replacing_placeholder {
                info!(%title, replacing = ?candidate.title, "Generated title");
            } else {
                info!(%title, "Generated title");
            }
        }
        if let Some(comment) = comment {
            info!(%comment, "Generated comment");
        }

        // ── Updating ─────────────────────────────────────────────────────
        if self.dry_run {
            info!("[DRY RUN] Would update bookmark");
        } else if let Err(e) = self.api.edit_bookmark(candidate.id, title, comment).await {
            // A sink write failure is an I/O problem like any other fetch
            // network error and goes through the same machinery.
            warn!(error = %e, "Bookmark update failed");
            self.backoff.on_failure();
            return self.apply_failure(candidate, FailureKind::Network);
        } else {
            info!("Bookmark updated");
        }

        self.state.record_success(&candidate.url);
        CandidateOutcome::Enriched
    }

    /// Shared retry decision for fetch, enrich, and sink failures.
    fn apply_failure(
        &mut self,
        candidate: &BookmarkCandidate,
        kind: FailureKind,
    ) -> CandidateOutcome {
        match self
            .state
            .record_failure(&candidate.url, candidate.id, kind, Utc::now())
        {
            RetryDecision::Retry { attempts } => {
                debug!(attempts, "Deferred; will retry on a future pass");
                CandidateOutcome::Deferred
            }
            RetryDecision::Exhausted { attempts } => {
                // Logged exactly once, at promotion.
                if kind == FailureKind::NotFound {
                    warn!("Post deleted or not found, marking as permanently failed");
                } else {
                    error!(attempts, error_type = %kind, "Max retries reached, marking as permanently failed");
                }
                CandidateOutcome::Failed
            }
        }
    }

    /// Write the state document, folding in the live backoff snapshot.
    fn persist(&mut self) -> Result<()> {
        self.state.backoff = self.backoff.state();
        self.store.save(&mut self.state)
    }

    /// Current state (for tests and the final log line).
    pub fn state(&self) -> &State {
        &self.state
    }
}
