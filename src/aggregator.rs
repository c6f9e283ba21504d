//! The production scraper: fetch and extract every active source.
//!
//! Each source is processed in isolation. A fetch failure is recorded in the
//! result's `errors` list, attributed to the source it came from, and the run
//! carries on with the remaining sources. Sources are fanned out with
//! `futures::stream::buffer_unordered`, so the order of the result lists is
//! not meaningful.

use crate::extractor;
use crate::fetcher::Fetcher;
use crate::models::{CandidateRecord, ScrapeError, ScrapeKind, ScrapeResult, Source};
use crate::sources::SourceRegistry;
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Tuning knobs for a scrape run.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeOptions {
    /// Maximum number of sources fetched at once.
    pub concurrency: usize,
    /// Per-request timeout handed to the fetcher.
    pub timeout: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Runs the source registry through a [`Fetcher`] and the extractor.
#[derive(Debug)]
pub struct ProductionScraper<F> {
    registry: SourceRegistry,
    fetcher: F,
    options: ScrapeOptions,
}

impl<F> ProductionScraper<F>
where
    F: Fetcher,
{
    pub fn new(registry: SourceRegistry, fetcher: F, options: ScrapeOptions) -> Self {
        Self {
            registry,
            fetcher,
            options,
        }
    }

    /// Scrape every active source matching `kind`.
    ///
    /// Never fails as a whole; per-source failures end up in
    /// [`ScrapeResult::errors`].
    #[instrument(level = "info", skip(self))]
    pub async fn scrape_all(&self, kind: ScrapeKind) -> ScrapeResult {
        let t0 = Instant::now();
        let targets: Vec<&Source> = self
            .registry
            .active()
            .filter(|s| kind.includes(s.class()))
            .collect();
        let concurrency = self.options.concurrency.max(1);

        info!(
            sources = targets.len(),
            concurrency,
            timeout_ms = self.options.timeout.as_millis() as u64,
            "Starting scrape run"
        );

        let outcomes: Vec<Result<Vec<CandidateRecord>, ScrapeError>> = stream::iter(targets)
            .map(|source| self.scrape_source(source))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut result = ScrapeResult::default();
        for outcome in outcomes {
            match outcome {
                Ok(records) => records.into_iter().for_each(|r| result.push(r)),
                Err(e) => result.errors.push(e),
            }
        }

        info!(
            institutions = result.institutions.len(),
            bursaries = result.bursaries.len(),
            degraded = result.degraded_count(),
            errors = result.errors.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Scrape run complete"
        );
        result
    }

    /// Fetch and extract one source.
    #[instrument(level = "info", skip_all, fields(source = %source.name))]
    pub async fn scrape_source(
        &self,
        source: &Source,
    ) -> Result<Vec<CandidateRecord>, ScrapeError> {
        let url = source.scrape_url();
        let markup = self
            .fetcher
            .fetch(url, self.options.timeout)
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "Fetch failed; skipping source");
                ScrapeError {
                    source: source.name.clone(),
                    kind: e.kind(),
                    message: e.to_string(),
                }
            })?;

        let records = extractor::extract(&markup, source);
        debug!(%url, count = records.len(), "Extracted candidates");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;
    use crate::fetcher::stub::StubFetcher;
    use crate::models::{ErrorKind, SourceType};
    use chrono::NaiveDate;

    fn source(name: &str, source_type: SourceType, active: bool) -> Source {
        Source {
            name: name.to_string(),
            url: format!("https://{}.example.org", name.to_lowercase()),
            source_type,
            admissions_url: None,
            application_url: None,
            active,
            location: None,
        }
    }

    fn registry(sources: Vec<Source>) -> SourceRegistry {
        SourceRegistry { sources }
    }

    fn options(concurrency: usize) -> ScrapeOptions {
        ScrapeOptions {
            concurrency,
            timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_one_success_one_timeout() {
        let timeout = Duration::from_millis(500);
        let fetcher = StubFetcher::new()
            .ok(
                "https://a.example.org",
                "<html><body><p>Closing date: 2025-09-30</p></body></html>",
            )
            .err("https://b.example.org", FetchError::Timeout(timeout));
        let scraper = ProductionScraper::new(
            registry(vec![
                source("A", SourceType::University, true),
                source("B", SourceType::Government, true),
            ]),
            fetcher,
            options(4),
        );

        let result = scraper.scrape_all(ScrapeKind::Both).await;

        assert_eq!(result.institutions.len(), 1);
        assert_eq!(result.bursaries.len(), 0);
        assert_eq!(
            result.error_messages(),
            vec!["B: request timed out after 500ms".to_string()]
        );
        assert_eq!(result.errors[0].kind, ErrorKind::FetchTimeout);
        assert_eq!(
            result.institutions[0].record.application_deadline,
            NaiveDate::from_ymd_opt(2025, 9, 30)
        );
        assert_eq!(
            result.institutions[0]
                .record
                .application_deadline
                .unwrap()
                .to_string(),
            "2025-09-30"
        );
    }

    #[tokio::test]
    async fn test_single_failure_does_not_abort_run() {
        let bursary_page = r#"
            <h2>Engineering Bursary</h2><p>R 40 000</p>
            <h2>Nursing Bursary</h2><p>R 30 000</p>
        "#;
        let fetcher = StubFetcher::new()
            .ok("https://uni.example.org", "<p>Deadline 2030-01-31</p>")
            .ok("https://college.example.org", "garbage")
            .ok("https://corp.example.org", bursary_page)
            .err(
                "https://broken.example.org",
                FetchError::Unreachable("connection refused".into()),
            );
        let scraper = ProductionScraper::new(
            registry(vec![
                source("Uni", SourceType::University, true),
                source("Broken", SourceType::Tvet, true),
                source("College", SourceType::College, true),
                source("Corp", SourceType::Private, true),
            ]),
            fetcher,
            options(2),
        );

        let result = scraper.scrape_all(ScrapeKind::Both).await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].source, "Broken");
        assert_eq!(result.errors[0].kind, ErrorKind::FetchUnreachable);
        // Uni: 1, College: 1 (degraded), Corp: 2 bursaries.
        assert_eq!(result.record_count(), 4);
        assert_eq!(result.institutions.len(), 2);
        assert_eq!(result.bursaries.len(), 2);
        assert_eq!(result.degraded_count(), 1);
    }

    #[tokio::test]
    async fn test_inactive_sources_are_not_fetched() {
        let fetcher = StubFetcher::new()
            .ok("https://on.example.org", "<p>Deadline 2030-01-31</p>")
            .ok("https://off.example.org", "<p>Deadline 2030-01-31</p>");
        let scraper = ProductionScraper::new(
            registry(vec![
                source("On", SourceType::University, true),
                source("Off", SourceType::University, false),
            ]),
            fetcher,
            options(4),
        );

        let result = scraper.scrape_all(ScrapeKind::Both).await;
        assert_eq!(result.institutions.len(), 1);
        assert_eq!(result.institutions[0].record.name, "On");
        assert_eq!(scraper.fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_kind_filter_limits_sources() {
        let fetcher = StubFetcher::new()
            .ok("https://uni.example.org", "<p>Deadline 2030-01-31</p>")
            .ok("https://gov.example.org", "<h2>Nursing Bursary</h2>");
        let scraper = ProductionScraper::new(
            registry(vec![
                source("Uni", SourceType::University, true),
                source("Gov", SourceType::Government, true),
            ]),
            fetcher,
            options(4),
        );

        let bursaries_only = scraper.scrape_all(ScrapeKind::Bursaries).await;
        assert_eq!(bursaries_only.institutions.len(), 0);
        assert_eq!(bursaries_only.bursaries.len(), 1);

        let institutions_only = scraper.scrape_all(ScrapeKind::Institutions).await;
        assert_eq!(institutions_only.institutions.len(), 1);
        assert_eq!(institutions_only.bursaries.len(), 0);
    }

    #[tokio::test]
    async fn test_every_failure_is_attributed_to_its_source() {
        let fetcher = StubFetcher::new()
            .err("https://a.example.org", FetchError::Status(500))
            .err("https://b.example.org", FetchError::Timeout(Duration::from_millis(500)))
            .ok("https://c.example.org", "<p>Deadline 2030-01-31</p>");
        let scraper = ProductionScraper::new(
            registry(vec![
                source("A", SourceType::University, true),
                source("B", SourceType::University, true),
                source("C", SourceType::University, true),
            ]),
            fetcher,
            options(8),
        );

        let result = scraper.scrape_all(ScrapeKind::Both).await;
        let mut messages = result.error_messages();
        messages.sort();
        assert_eq!(
            messages,
            vec![
                "A: HTTP status 500".to_string(),
                "B: request timed out after 500ms".to_string(),
            ]
        );
        assert_eq!(result.institutions.len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_runs_agree() {
        let build = |concurrency| {
            let fetcher = StubFetcher::new()
                .ok("https://a.example.org", "<p>Deadline 2030-01-31</p>")
                .ok("https://b.example.org", "<h2>Diploma in Nursing</h2>")
                .ok("https://c.example.org", "<h2>Maths Scholarship</h2>");
            ProductionScraper::new(
                registry(vec![
                    source("A", SourceType::University, true),
                    source("B", SourceType::Tvet, true),
                    source("C", SourceType::Private, true),
                ]),
                fetcher,
                options(concurrency),
            )
        };

        let sequential = build(1).scrape_all(ScrapeKind::Both).await;
        let concurrent = build(3).scrape_all(ScrapeKind::Both).await;
        assert_eq!(sequential.record_count(), concurrent.record_count());
        assert_eq!(sequential.errors.len(), concurrent.errors.len());
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_treated_as_one() {
        let fetcher = StubFetcher::new().ok("https://a.example.org", "<p>Deadline 2030-01-31</p>");
        let scraper = ProductionScraper::new(
            registry(vec![source("A", SourceType::University, true)]),
            fetcher,
            options(0),
        );
        let result = scraper.scrape_all(ScrapeKind::Both).await;
        assert_eq!(result.institutions.len(), 1);
    }
}
