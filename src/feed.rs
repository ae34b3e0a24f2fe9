//! Acquisition of a day's dataset, with retry on transient failures.
//!
//! The hydrator does not download or filter raw GDELT event tables itself;
//! an upstream step does that and leaves one JSON dataset per day. This
//! module reads those datasets, either from disk ([`FileSource`]) or over
//! HTTP ([`HttpSource`]).
//!
//! # Retry Strategy
//!
//! [`RetrySource`] wraps any [`DatasetSource`] and retries transient errors
//! (network faults, 5xx responses) according to a [`RetryPolicy`]:
//!
//! - Fixed delay between attempts (5 seconds by default)
//! - Optional random jitter added to each delay
//! - Unlimited attempts by default, or capped with `max_attempts`
//!
//! Each attempt starts from scratch, so nothing from a failed attempt is kept.
//! Non-transient errors are returned immediately.

use crate::error::FeedError;
use crate::models::Dataset;
use chrono::NaiveDate;
use rand::{Rng, rng};
use reqwest::Client;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Something that can produce the dataset for a given day.
pub trait DatasetSource: Send + Sync {
    fn load(&self, day: NaiveDate) -> impl Future<Output = Result<Dataset, FeedError>> + Send;
}

/// File name of a day's dataset: `{prefix}_{YYYY-MM-DD}.json`.
pub fn dataset_file_name(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}_{day}.json")
}

/// Reads `{data_dir}/{prefix}_{day}.json`.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub data_dir: PathBuf,
    pub prefix: String,
}

impl DatasetSource for FileSource {
    #[instrument(level = "info", skip_all, fields(%day))]
    async fn load(&self, day: NaiveDate) -> Result<Dataset, FeedError> {
        let path = self.data_dir.join(dataset_file_name(&self.prefix, day));
        debug!(path = %path.display(), "Reading dataset");
        let bytes = tokio::fs::read(&path).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        Dataset::from_json(value)
    }
}

/// Fetches `{base_url}/{prefix}_{day}.json`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    pub client: Client,
    pub base_url: String,
    pub prefix: String,
}

impl DatasetSource for HttpSource {
    #[instrument(level = "info", skip_all, fields(%day))]
    async fn load(&self, day: NaiveDate) -> Result<Dataset, FeedError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            dataset_file_name(&self.prefix, day)
        );
        debug!(%url, "Fetching dataset");
        let response = self.client.get(&url).send().await.map_err(FeedError::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await.map_err(FeedError::Network)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        Dataset::from_json(value)
    }
}

/// How [`RetrySource`] waits between attempts and when it gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between attempts.
    pub delay: Duration,
    /// Upper bound on random extra wait added to each delay.
    pub jitter: Duration,
    /// Total attempts before giving up; `None` retries forever.
    pub max_attempts: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            jitter: Duration::ZERO,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempts` have failed.
    pub fn allows(&self, attempts: usize) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }

    /// Delay before the next attempt.
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }
}

/// Decorator that retries transient failures of the wrapped source.
pub struct RetrySource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetrySource<S>
where
    S: DatasetSource,
{
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<S: fmt::Debug> fmt::Debug for RetrySource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySource")
            .field("inner", &self.inner)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S> DatasetSource for RetrySource<S>
where
    S: DatasetSource,
{
    #[instrument(level = "info", skip_all, fields(%day))]
    async fn load(&self, day: NaiveDate) -> Result<Dataset, FeedError> {
        let t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.load(day).await {
                Ok(dataset) => {
                    info!(rows = dataset.len(), attempts = attempt + 1, "Dataset loaded");
                    return Ok(dataset);
                }
                Err(e) if !e.is_transient() => {
                    error!(error = %e, "Dataset load failed; not retrying");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if !self.policy.allows(attempt) {
                        error!(
                            attempt,
                            elapsed_ms_total = t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Dataset load exhausted retries"
                        );
                        return Err(e);
                    }
                    let delay = self.policy.next_delay();
                    warn!(attempt, ?delay, error = %e, "Dataset load failed; retrying");
                    sleep(delay).await;
                }
            }
        }
    }
}
