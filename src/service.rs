//! The automation service: one instance wired at startup with its scraper
//! and store, answering every operator request.
//!
//! Every operation returns an [`Envelope`]. Partial failures (a source that
//! could not be fetched, a table that could not be swept) are embedded in
//! `errors`; `success` turns false only when the operation could not produce
//! its primary result or could not write it.

use crate::aggregator::ProductionScraper;
use crate::deadlines::{DeadlineCheck, DeadlineManager, ExpiryReport};
use crate::fetcher::Fetcher;
use crate::models::{ScrapeKind, ScrapeResult, StatusSummary};
use crate::report::{Report, build_report};
use crate::store::{PersistOutcome, Store, persist_scrape};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

/// Response body shared by all operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub errors: Vec<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T, errors: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors,
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
        }
    }
}

/// Maintenance actions an operator can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Deactivate rows whose deadline has passed.
    MarkExpired,
    /// Report stale and upcoming deadlines without changing anything.
    CheckDeadlines,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "result", rename_all = "kebab-case")]
pub enum ActionOutcome {
    MarkExpired(ExpiryReport),
    CheckDeadlines(DeadlineCheck),
}

/// Output of a scrape request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRun {
    #[serde(flatten)]
    pub result: ScrapeResult,
    pub persisted: Option<PersistOutcome>,
}

pub struct AutomationService<F, S> {
    scraper: ProductionScraper<F>,
    store: S,
}

impl<F, S> AutomationService<F, S>
where
    F: Fetcher,
    S: Store,
{
    pub fn new(scraper: ProductionScraper<F>, store: S) -> Self {
        Self { scraper, store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn deadlines(&self) -> DeadlineManager<'_, S> {
        DeadlineManager::new(&self.store)
    }

    /// Scrape every active source of `kind`, optionally writing the results.
    #[instrument(level = "info", skip(self))]
    pub async fn run_scrape(&self, kind: ScrapeKind, persist: bool) -> Envelope<ScrapeRun> {
        let result = self.scraper.scrape_all(kind).await;
        let mut errors = result.error_messages();

        let mut success = true;
        let persisted = if persist {
            match persist_scrape(&self.store, &result).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(error = %e, "Persisting scrape results failed");
                    errors.push(format!("persistence: {e}"));
                    success = false;
                    None
                }
            }
        } else {
            None
        };

        info!(
            records = result.record_count(),
            errors = errors.len(),
            success,
            "Scrape request finished"
        );
        Envelope {
            success,
            data: Some(ScrapeRun { result, persisted }),
            errors,
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn status_summary(&self) -> Envelope<StatusSummary> {
        match self.deadlines().application_status_summary().await {
            Ok(summary) => Envelope::ok(summary, Vec::new()),
            Err(e) => {
                error!(error = %e, "Status summary failed");
                Envelope::failed(vec![e.to_string()])
            }
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn status_report(&self) -> Envelope<Report> {
        match self.deadlines().application_status_summary().await {
            Ok(summary) => {
                let report = build_report(&summary);
                if report.has_critical_alerts() {
                    warn!(alerts = ?report.alerts, "Status report raised critical alerts");
                }
                Envelope::ok(report, Vec::new())
            }
            Err(e) => {
                error!(error = %e, "Status report failed");
                Envelope::failed(vec![e.to_string()])
            }
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn perform_action(&self, action: Action) -> Envelope<ActionOutcome> {
        let (outcome, failures) = match action {
            Action::MarkExpired => {
                let report = self.deadlines().mark_expired_items_inactive().await;
                info!(
                    updated = report.total_updated(),
                    failed_tables = report.errors.len(),
                    "Expiry sweep finished"
                );
                let failures = report.errors.clone();
                (ActionOutcome::MarkExpired(report), failures)
            }
            Action::CheckDeadlines => {
                let check = self.deadlines().check_deadlines().await;
                info!(
                    stale = check.expired_still_active.total(),
                    upcoming = check.upcoming.len(),
                    "Deadline check finished"
                );
                let failures = check.errors.clone();
                (ActionOutcome::CheckDeadlines(check), failures)
            }
        };

        let errors: Vec<String> = failures
            .iter()
            .map(|f| format!("{}: {}", f.table, f.message))
            .collect();
        Envelope {
            success: errors.is_empty(),
            data: Some(outcome),
            errors,
        }
    }
}
