//! # Apply4Me Scraper
//!
//! Scrapes South African university, college and TVET admissions pages and
//! bursary provider listings, persists what it finds, and tracks application
//! deadlines so that stale listings can be reported and deactivated.
//!
//! ## Usage
//!
//! ```sh
//! apply4me_scraper scrape --persist
//! apply4me_scraper status
//! apply4me_scraper report -m ./reports
//! apply4me_scraper action mark-expired
//! ```
//!
//! ## Architecture
//!
//! 1. **Registry**: built-in or YAML list of sources
//! 2. **Fetching**: one HTTP GET per active source, bounded fan-out
//! 3. **Extraction**: deadlines, programs and bursaries from the markup,
//!    with a flagged fallback record when nothing matches
//! 4. **Persistence**: rows in the JSON store
//! 5. **Status**: open/closed counts, report, expiry sweep
//!
//! Every command prints a JSON envelope `{success, data, errors}` on stdout.
//! Logs go to stderr.

use clap::Parser;
use serde::Serialize;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod cli;
mod deadlines;
mod extractor;
mod fetcher;
mod models;
mod outputs;
mod report;
mod service;
mod sources;
mod store;
mod utils;

use aggregator::{ProductionScraper, ScrapeOptions};
use cli::{Cli, Command};
use fetcher::{HttpFetcher, SourceFetcher};
use outputs::{indexes, json, markdown};
use service::{Action, AutomationService, Envelope};
use store::JsonStore;
use utils::ensure_writable_dir;

/// Print `envelope` on stdout and, when configured, keep a dated copy.
async fn emit<T: Serialize>(
    envelope: &Envelope<T>,
    json_output_dir: Option<&str>,
    stem: &str,
) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    if let Some(dir) = json_output_dir {
        if let Err(e) = json::write_json(envelope, dir, stem).await {
            error!(error = %e, "Failed to write JSON output");
        }
    }
    Ok(())
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("apply4me_scraper starting up");

    let args = Cli::parse();
    debug!(?args.command, %args.store, ?args.sources, "Parsed CLI arguments");

    // Early check: fail before any network work if outputs can't be written.
    for dir in [&args.json_output_dir, &args.markdown_output_dir].into_iter().flatten() {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    // ---- Wire the service once ----
    let registry = sources::load_or_builtin(args.sources.as_deref()).await?;
    let (fetch_retries, options) = match &args.command {
        Command::Scrape(scrape) => (scrape.fetch_retries, scrape.options()),
        _ => (0, ScrapeOptions::default()),
    };
    let fetcher = SourceFetcher::new(HttpFetcher::new()?, fetch_retries);
    let store = JsonStore::open(&args.store).await?;
    let service = AutomationService::new(ProductionScraper::new(registry, fetcher, options), store);

    let json_dir = args.json_output_dir.as_deref();
    let success = match &args.command {
        Command::Scrape(scrape) => {
            let envelope = service.run_scrape(scrape.kind, scrape.persist).await;
            emit(&envelope, json_dir, "scrape").await?;
            envelope.success
        }
        Command::Status => {
            let envelope = service.status_summary().await;
            emit(&envelope, json_dir, "status").await?;
            envelope.success
        }
        Command::Report => {
            let envelope = service.status_report().await;
            emit(&envelope, json_dir, "report").await?;
            let markdown_dir = args.markdown_output_dir.as_deref();
            if let (Some(dir), Some(report)) = (markdown_dir, &envelope.data) {
                let date = utils::today();
                match markdown::write_report(report, dir, date).await {
                    Ok(filename) => {
                        if let Err(e) = indexes::update_reports_index(dir, date, &filename).await {
                            error!(error = %e, "Failed to update reports index");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed writing Markdown report"),
                }
            }
            envelope.success
        }
        Command::Action { action } => {
            let envelope = service.perform_action(*action).await;
            let stem = match action {
                Action::MarkExpired => "mark-expired",
                Action::CheckDeadlines => "check-deadlines",
            };
            emit(&envelope, json_dir, stem).await?;
            envelope.success
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        success,
        "Execution complete"
    );

    Ok(())
}
