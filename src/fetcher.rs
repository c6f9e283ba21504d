//! HTTP fetching of source pages, with optional retry and backoff.
//!
//! The module uses a trait-based design so the aggregator can be driven by
//! the real network client or by a stub in tests:
//! - [`Fetcher`]: Core trait, one GET per call
//! - [`HttpFetcher`]: `reqwest` implementation with a per-request timeout
//! - [`RetryFetch`]: Decorator adding exponential backoff to any [`Fetcher`]
//!
//! # Retry Strategy
//!
//! A scrape run makes a single attempt per source unless the operator opts in
//! with `--fetch-retries`. When enabled, only transient failures (timeouts,
//! unreachable hosts, 429 and 5xx responses) are retried:
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
//! ```

use crate::models::ErrorKind;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// User agent sent with every request.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Apply4MeBot/1.0; +https://apply4me.co.za/bot)";

/// Why a single fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("host unreachable: {0}")]
    Unreachable(String),
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl FetchError {
    /// Map to the error taxonomy reported in a scrape result.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Timeout(_) => ErrorKind::FetchTimeout,
            FetchError::Status(_) => ErrorKind::FetchHttpError,
            FetchError::Unreachable(_) => ErrorKind::FetchUnreachable,
            FetchError::InvalidUrl { .. } | FetchError::Body(_) => ErrorKind::ParseError,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Unreachable(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::InvalidUrl { .. } | FetchError::Body(_) => false,
        }
    }
}

/// Retrieve the raw markup behind a URL.
pub trait Fetcher {
    /// Issue one GET against `url`, giving up after `timeout`.
    ///
    /// Returns the body text on a 2xx response.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Parse `url` and insist on an absolute HTTP(S) address.
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// The network-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the bot user agent and HTML accept headers.
    pub fn new() -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-ZA,en;q=0.9"));
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else if let Some(status) = e.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Unreachable(e.to_string())
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(
        level = "debug",
        skip(self, timeout),
        fields(timeout_ms = timeout.as_millis() as u64)
    )]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let parsed = validate_url(url)?;
        let t0 = Instant::now();

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success response");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetcher`].
pub struct RetryFetch<T> {
    inner: T,
    /// Maximum number of retries after the first attempt.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: Duration,
    /// Cap on the exponential part of the delay.
    max_delay: Duration,
    /// Upper bound of the random jitter added to each delay.
    max_jitter: Duration,
}

impl<T> RetryFetch<T>
where
    T: Fetcher,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }

    #[cfg(test)]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt - 1).min(16) as u32;
        let mut delay = self.base_delay.saturating_mul(1 << shift);
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Fetcher for RetryFetch<T>
where
    T: Fetcher,
{
    #[instrument(level = "debug", skip(self, timeout))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url, timeout).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if !e.is_transient() || attempt > self.max_retries {
                        if attempt > 1 {
                            error!(
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                                error = %e,
                                "fetch() giving up"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Runtime choice between a bare client and a retrying one.
#[derive(Debug)]
pub enum SourceFetcher {
    Single(HttpFetcher),
    Retrying(RetryFetch<HttpFetcher>),
}

impl SourceFetcher {
    /// Wrap `client` in [`RetryFetch`] only when `retries > 0`.
    pub fn new(client: HttpFetcher, retries: usize) -> Self {
        if retries == 0 {
            SourceFetcher::Single(client)
        } else {
            SourceFetcher::Retrying(RetryFetch::new(client, retries, Duration::from_secs(1)))
        }
    }
}

impl Fetcher for SourceFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        match self {
            SourceFetcher::Single(f) => f.fetch(url, timeout).await,
            SourceFetcher::Retrying(f) => f.fetch(url, timeout).await,
        }
    }
}
