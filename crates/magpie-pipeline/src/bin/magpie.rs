//! magpie: bookmark enrichment daemon.
//!
//! Watches a bookmark service for X.com/Twitter bookmarks missing a title
//! or comment, fetches the post content, asks a local Ollama model for a
//! title and summary, and writes the result back.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magpie_client::HttpBookmarkApi;
use magpie_enrich::Enricher;
use magpie_fetch::{BackoffPolicy, PostFetcher};
use magpie_pipeline::{shutdown, Config, Orchestrator};
use magpie_state::StateStore;

#[derive(Parser)]
#[command(name = "magpie")]
#[command(author, version, about = "Bookmark enrichment daemon")]
struct Cli {
    /// Ignore the saved cursor and process all bookmarks from the beginning
    #[arg(long)]
    from_start: bool,

    /// Fetch and generate content but don't write updates back
    #[arg(long)]
    dry_run: bool,

    /// Detailed output (debug-level logs, decision points)
    #[arg(short, long)]
    verbose: bool,

    /// Minimal output (warnings and errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Path to .env file (default: .env in the current directory)
    #[arg(long)]
    env_file: Option<PathBuf>,
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "warn"
    } else if verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "info"
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            if let Err(e) = dotenvy::from_path(path) {
                eprintln!("Could not load env file {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
        // A missing default .env is fine; the environment may be complete.
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    init_logging(cli.verbose, cli.quiet);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration error");
            return ExitCode::FAILURE;
        }
    };

    info!("magpie starting...");
    info!(api = %config.api_url, model = %config.ollama_model, "Configuration loaded");
    if cli.dry_run {
        info!("DRY RUN MODE - no changes will be written");
    }

    // A broken inference setup would only accumulate failures; refuse to
    // start instead.
    let enricher = Enricher::new(&config.ollama_base, &config.ollama_model);
    info!("Checking Ollama connection...");
    if let Err(e) = enricher.check_model().await {
        error!(error = %e, "Ollama check failed");
        return ExitCode::FAILURE;
    }
    info!("Ollama connection OK");

    let store = StateStore::new(&config.state_file);
    let mut state = store.load();
    if cli.from_start {
        info!("--from-start: clearing saved cursor");
        state.cursor = None;
    }

    let backoff = BackoffPolicy::new(
        config.fetch_min_delay,
        config.fetch_max_delay,
        config.fetch_max_backoff,
    );
    let api = HttpBookmarkApi::new(&config.api_url, &config.api_token);
    let fetcher = PostFetcher::new();
    let shutdown = shutdown::listen();

    let mut orchestrator = Orchestrator::new(api, fetcher, enricher, backoff, store, state, shutdown)
        .with_sync_limit(config.sync_limit)
        .with_dry_run(cli.dry_run);

    match orchestrator.run().await {
        Ok(()) => {
            info!(
                retries_pending = orchestrator.state().retries.len(),
                permanently_failed = orchestrator.state().failed.len(),
                "State saved"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Pipeline terminated abnormally");
            ExitCode::FAILURE
        }
    }
}
