//! Data models for scraped candidates, scrape results and status summaries.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Source`]: A configured institution or bursary website
//! - [`ScrapedInstitution`] / [`ScrapedBursary`]: Candidate records produced by extraction
//! - [`Candidate`]: A record tagged with how it was obtained (extracted or degraded)
//! - [`ScrapeResult`]: The aggregate of one scrape run, including per-source errors
//! - [`StatusSummary`]: Open/closed counts derived from persisted deadlines
//!
//! Everything that crosses the operator boundary serializes with camelCase
//! field names so the JSON matches what the web front-end already consumes.

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location used when a source does not declare one.
pub const DEFAULT_LOCATION: &str = "South Africa";

/// The kind of organisation behind a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    University,
    College,
    Tvet,
    Government,
    Private,
}

impl SourceType {
    /// Universities, colleges and TVETs publish admissions; government and
    /// private sources publish bursaries.
    pub fn class(self) -> SourceClass {
        match self {
            SourceType::University | SourceType::College | SourceType::Tvet => {
                SourceClass::Institution
            }
            SourceType::Government | SourceType::Private => SourceClass::Bursary,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::University => "university",
            SourceType::College => "college",
            SourceType::Tvet => "tvet",
            SourceType::Government => "government",
            SourceType::Private => "private",
        };
        f.write_str(s)
    }
}

/// Which result list a source feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceClass {
    Institution,
    Bursary,
}

/// Source-type filter accepted by a scrape run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeKind {
    Institutions,
    Bursaries,
    #[default]
    Both,
}

impl ScrapeKind {
    pub fn includes(self, class: SourceClass) -> bool {
        matches!(
            (self, class),
            (ScrapeKind::Both, _)
                | (ScrapeKind::Institutions, SourceClass::Institution)
                | (ScrapeKind::Bursaries, SourceClass::Bursary)
        )
    }
}

/// A configured website the scraper targets.
///
/// Sources are loaded once at startup (built-in registry or YAML file) and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Display name, also used to attribute errors.
    pub name: String,
    /// Landing page of the organisation.
    pub url: String,
    /// Organisation type; decides institution vs bursary classification.
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Admissions page, preferred for institution sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admissions_url: Option<String>,
    /// Application page, preferred for bursary sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_url: Option<String>,
    /// Inactive sources are skipped by the aggregator.
    pub active: bool,
    /// Human readable location; falls back to [`DEFAULT_LOCATION`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Source {
    pub fn class(&self) -> SourceClass {
        self.source_type.class()
    }

    /// The page the fetcher should request for this source.
    pub fn scrape_url(&self) -> &str {
        let preferred = match self.class() {
            SourceClass::Institution => self.admissions_url.as_deref(),
            SourceClass::Bursary => self.application_url.as_deref(),
        };
        preferred.unwrap_or(&self.url)
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or(DEFAULT_LOCATION)
    }
}

/// An institution entry produced by one scrape of one source.
///
/// Not an identity: two runs may produce logically identical records.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedInstitution {
    pub name: String,
    #[serde(rename = "type")]
    pub institution_type: SourceType,
    pub location: String,
    pub website: String,
    pub description: Option<String>,
    pub application_deadline: Option<NaiveDate>,
    /// Program-like headings found on the page.
    #[serde(default)]
    pub programs: Vec<String>,
    /// Name of the source the record came from.
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

/// A bursary entry produced by one scrape of one source.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedBursary {
    pub title: String,
    pub provider: String,
    /// Amount in rand, when the page states one.
    pub amount: Option<f64>,
    pub application_deadline: Option<NaiveDate>,
    pub source: String,
    /// `true` when the deadline is unknown or not yet passed.
    pub is_active: bool,
}

/// How a candidate record was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// At least one extraction rule matched the page.
    Extracted,
    /// Nothing matched; the record was built from source metadata only.
    Degraded,
}

/// A record tagged with its [`ExtractionStatus`] so consumers can filter
/// low-confidence data.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Candidate<T> {
    pub status: ExtractionStatus,
    pub record: T,
}

impl<T> Candidate<T> {
    pub fn extracted(record: T) -> Self {
        Self {
            status: ExtractionStatus::Extracted,
            record,
        }
    }

    pub fn degraded(record: T) -> Self {
        Self {
            status: ExtractionStatus::Degraded,
            record,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ExtractionStatus::Degraded
    }
}

/// One candidate produced by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateRecord {
    Institution(Candidate<ScrapedInstitution>),
    Bursary(Candidate<ScrapedBursary>),
}

impl CandidateRecord {
    #[cfg(test)]
    pub fn status(&self) -> ExtractionStatus {
        match self {
            CandidateRecord::Institution(c) => c.status,
            CandidateRecord::Bursary(c) => c.status,
        }
    }
}

/// Classification of a per-source scrape failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    FetchTimeout,
    FetchHttpError,
    FetchUnreachable,
    ParseError,
}

/// A failure attributed to the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScrapeError {
    pub source: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// The aggregate of one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScrapeResult {
    pub institutions: Vec<Candidate<ScrapedInstitution>>,
    pub bursaries: Vec<Candidate<ScrapedBursary>>,
    pub errors: Vec<ScrapeError>,
}

impl ScrapeResult {
    /// Errors in the legacy `"<source>: <message>"` form.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn record_count(&self) -> usize {
        self.institutions.len() + self.bursaries.len()
    }

    pub fn degraded_count(&self) -> usize {
        self.institutions.iter().filter(|c| c.is_degraded()).count()
            + self.bursaries.iter().filter(|c| c.is_degraded()).count()
    }

    pub fn push(&mut self, record: CandidateRecord) {
        match record {
            CandidateRecord::Institution(c) => self.institutions.push(c),
            CandidateRecord::Bursary(c) => self.bursaries.push(c),
        }
    }
}

/// A persisted row whose deadline falls inside the look-ahead window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDeadline {
    pub table: String,
    pub name: String,
    pub deadline: NaiveDate,
    pub days_left: i64,
}

/// Open/closed counts derived from persisted deadlines. Never cached.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub open_institutions: usize,
    pub closed_institutions: usize,
    pub open_programs: usize,
    pub closed_programs: usize,
    pub active_bursaries: usize,
    pub expired_bursaries: usize,
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
}

impl StatusSummary {
    pub fn total_institutions(&self) -> usize {
        self.open_institutions + self.closed_institutions
    }

    pub fn total_programs(&self) -> usize {
        self.open_programs + self.closed_programs
    }

    pub fn total_bursaries(&self) -> usize {
        self.active_bursaries + self.expired_bursaries
    }
}
