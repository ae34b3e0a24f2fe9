//! Runtime configuration.
//!
//! Everything the driver needs is carried in one [`HydrateConfig`] value
//! that is passed in at construction. The hydration engine itself never
//! sees paths.
//!
//! Loaded from an optional YAML file; every field has a default, so a file
//! only needs the settings it changes:
//!
//! ```yaml
//! data_dir: /data/gdelt/data
//! content_dir: /data/gdelt/hydrated
//! markup_dir: /data/gdelt/hydrated/html
//! concurrency: 32
//! feed:
//!   url: https://feeds.example.org/gdelt
//!   max_attempts: 20
//! ```

use crate::error::HydrateError;
use crate::feed::RetryPolicy;
use crate::hydrate::{DEFAULT_CONCURRENCY, DEFAULT_PROBE_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Settings for the upstream dataset feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Base URL to fetch daily datasets from; read from `data_dir` when unset.
    pub url: Option<String>,
    pub retry_delay_secs: u64,
    pub jitter_ms: u64,
    /// Attempts before giving up on a day; unlimited when unset.
    pub max_attempts: Option<usize>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            retry_delay_secs: 5,
            jitter_ms: 0,
            max_attempts: None,
        }
    }
}

impl FeedConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_secs(self.retry_delay_secs),
            jitter: Duration::from_millis(self.jitter_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HydrateConfig {
    /// Where the daily `{prefix}_{day}.json` datasets live.
    pub data_dir: PathBuf,
    pub content_dir: PathBuf,
    pub markup_dir: PathBuf,
    pub corrected_dir: PathBuf,
    pub file_prefix: String,
    /// Input column holding each record's source URL.
    pub url_column: String,
    pub concurrency: usize,
    pub probe_timeout_secs: u64,
    /// Bound on the full-page downloads; `null` leaves them unbounded.
    pub fetch_timeout_secs: Option<u64>,
    pub user_agent: String,
    /// Also write `http_code` into the content table.
    pub content_includes_http_code: bool,
    pub correction_concurrency: usize,
    pub feed: FeedConfig,
}

impl Default for HydrateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            content_dir: PathBuf::from("hydrated"),
            markup_dir: PathBuf::from("hydrated/html"),
            corrected_dir: PathBuf::from("hydrated/http"),
            file_prefix: "IN".to_string(),
            url_column: "SOURCEURL".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT.as_secs(),
            fetch_timeout_secs: Some(120),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            content_includes_http_code: false,
            correction_concurrency: 8,
            feed: FeedConfig::default(),
        }
    }
}

impl HydrateConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, HydrateError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a YAML file, or fall back to defaults when `path` is `None`.
    #[instrument(level = "info", skip_all)]
    pub async fn load(path: Option<&Path>) -> Result<Self, HydrateError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let yaml = tokio::fs::read_to_string(path).await?;
        let config = Self::from_yaml(&yaml)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}
