//! Error types for each hydration stage and for the batch as a whole.
//!
//! Per-URL failures ([`ExtractionFailure`], [`FetchFailure`]) never leave the
//! pipeline; they are logged and folded into empty record fields. They keep
//! their kind so the logs say *why* a page came back empty.
//!
//! [`HydrateError`] is for failures that abort a whole day's batch, the most
//! important being [`HydrateError::SchemaMismatch`].

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of the primary (structured) extraction of one page.
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("invalid page url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("download failed: {0}")]
    Download(#[source] reqwest::Error),

    #[error("server responded with {0}")]
    Status(StatusCode),

    #[error("could not read page body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("page parser did not finish: {0}")]
    Parse(#[source] tokio::task::JoinError),
}

/// Failure of the fallback raw-markup fetch.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("invalid page url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("raw fetch failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("could not read raw body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("response is {0}, not markup")]
    NotMarkup(String),

    #[error("response of {bytes} bytes exceeds the {limit} byte limit")]
    TooLarge { bytes: u64, limit: u64 },

    #[error("markup repair did not finish: {0}")]
    Parse(#[source] tokio::task::JoinError),
}

/// Failure while acquiring a day's dataset from the upstream feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error while fetching dataset: {0}")]
    Network(#[source] reqwest::Error),

    #[error("feed responded with {0}")]
    Status(u16),

    #[error("could not read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dataset has an unsupported shape: {0}")]
    Shape(String),
}

impl FeedError {
    /// Whether retrying the same request may succeed.
    ///
    /// Network faults and 5xx responses are transient; a missing file, a 4xx
    /// or a malformed payload will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Network(_) => true,
            FeedError::Status(code) => *code >= 500,
            FeedError::Io(_) | FeedError::Json(_) | FeedError::Shape(_) => false,
        }
    }
}

/// Batch-level failure.
#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("dataset has {original} rows but {extracted} extraction records were produced")]
    SchemaMismatch { original: usize, extracted: usize },

    #[error("dataset has no `{0}` column")]
    MissingColumn(String),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
