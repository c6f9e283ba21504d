//! Command-line interface definitions for the Apply4Me scraper.
//!
//! Global options locate the store, the source registry and the optional
//! output directories; each can also come from an environment variable.

use crate::aggregator::ScrapeOptions;
use crate::models::ScrapeKind;
use crate::service::Action;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

/// Command-line arguments for the Apply4Me scraper.
///
/// # Examples
///
/// ```sh
/// # Scrape everything and write the results to the store
/// apply4me_scraper scrape --persist
///
/// # Only bursary providers, with retries
/// apply4me_scraper scrape --kind bursaries --fetch-retries 2
///
/// # Status report, also written as Markdown
/// apply4me_scraper -m ./reports report
///
/// # Deactivate everything past its deadline
/// apply4me_scraper action mark-expired
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path of the JSON store file
    #[arg(
        short,
        long,
        env = "APPLY4ME_STORE",
        default_value = "./data/store.json",
        global = true
    )]
    pub store: String,

    /// YAML file overriding the built-in source registry
    #[arg(long, env = "APPLY4ME_SOURCES", global = true)]
    pub sources: Option<String>,

    /// Directory for dated JSON copies of every response
    #[arg(short, long, env = "APPLY4ME_JSON_DIR", global = true)]
    pub json_output_dir: Option<String>,

    /// Directory for Markdown status reports
    #[arg(short, long, env = "APPLY4ME_MARKDOWN_DIR", global = true)]
    pub markdown_output_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch every active source and extract candidates
    Scrape(ScrapeArgs),
    /// Open/closed counts from the store
    Status,
    /// Status counts with rates, insights, alerts and recommendations
    Report,
    /// Run a maintenance action against the store
    Action {
        #[arg(value_enum)]
        action: Action,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ScrapeArgs {
    /// Which sources to scrape
    #[arg(short, long, value_enum, default_value_t = ScrapeKind::Both)]
    pub kind: ScrapeKind,

    /// Maximum number of sources fetched at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,

    /// Extra attempts for timeouts, 5xx and connection errors
    #[arg(long, default_value_t = 0)]
    pub fetch_retries: usize,

    /// Insert the extracted records into the store
    #[arg(long)]
    pub persist: bool,
}

impl ScrapeArgs {
    pub fn options(&self) -> ScrapeOptions {
        ScrapeOptions {
            concurrency: self.concurrency,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}
