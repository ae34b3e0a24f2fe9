//! Day-by-day orchestration of a hydration run.
//!
//! The driver owns the configuration, the dataset source and the pipeline.
//! For each day it loads the dataset, hydrates every URL, merges the
//! records back by position and writes the two output tables.

use crate::aggregate;
use crate::config::HydrateConfig;
use crate::error::{FeedError, HydrateError};
use crate::feed::{DatasetSource, FileSource, HttpSource, RetrySource};
use crate::hydrate::{
    ArticleExtractor, Extractor, HtmlFallback, HttpPipeline, HttpProber, Pipeline, Prober,
    RawFetcher, Tally, pool,
};
use crate::models::{Dataset, UrlTask};
use crate::outputs::csv::write_table;
use crate::outputs::{content_file_name, markup_file_name};
use crate::utils::{days, ensure_writable_dir};
use chrono::NaiveDate;
use reqwest::Client;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// Where datasets come from: disk, or an upstream HTTP feed.
#[derive(Debug)]
pub enum FeedSource {
    File(RetrySource<FileSource>),
    Http(RetrySource<HttpSource>),
}

impl FeedSource {
    /// `HttpSource` when `feed.url` is set, `FileSource` on `data_dir` otherwise.
    pub fn from_config(config: &HydrateConfig, client: Client) -> Self {
        let policy = config.feed.retry_policy();
        match &config.feed.url {
            Some(base_url) => FeedSource::Http(RetrySource::new(
                HttpSource {
                    client,
                    base_url: base_url.clone(),
                    prefix: config.file_prefix.clone(),
                },
                policy,
            )),
            None => FeedSource::File(RetrySource::new(
                FileSource {
                    data_dir: config.data_dir.clone(),
                    prefix: config.file_prefix.clone(),
                },
                policy,
            )),
        }
    }
}

impl DatasetSource for FeedSource {
    async fn load(&self, day: NaiveDate) -> Result<Dataset, FeedError> {
        match self {
            FeedSource::File(source) => source.load(day).await,
            FeedSource::Http(source) => source.load(day).await,
        }
    }
}

/// What one day produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub day: NaiveDate,
    pub rows: usize,
    pub tally: Tally,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub days: Vec<DaySummary>,
}

impl RunSummary {
    pub fn rows(&self) -> usize {
        self.days.iter().map(|d| d.rows).sum()
    }

    pub fn tally(&self) -> Tally {
        let mut total = Tally::default();
        for day in &self.days {
            total += day.tally;
        }
        total
    }
}

pub struct Driver<S, P, E, F> {
    config: HydrateConfig,
    source: S,
    pipeline: Arc<Pipeline<P, E, F>>,
}

impl Driver<FeedSource, HttpProber, ArticleExtractor, HtmlFallback> {
    /// Wire the real HTTP stages and dataset source from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built (TLS backend
    /// initialization failure or an invalid user agent).
    pub fn new(config: HydrateConfig) -> Result<Self, Box<dyn Error>> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.fetch_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let pipeline: HttpPipeline = Pipeline::new(
            HttpProber::new(&config.user_agent, config.probe_timeout())?,
            ArticleExtractor::new(client.clone()),
            HtmlFallback::new(client.clone()),
        );
        let source = FeedSource::from_config(&config, client);
        let kind = match source {
            FeedSource::File(_) => "file",
            FeedSource::Http(_) => "http",
        };
        info!(
            source = kind,
            concurrency = config.concurrency,
            "Driver initialized"
        );
        Ok(Self::with_parts(config, source, pipeline))
    }
}

impl<S, P, E, F> Driver<S, P, E, F>
where
    S: DatasetSource,
    P: Prober + 'static,
    E: Extractor + 'static,
    F: RawFetcher + 'static,
{
    pub fn with_parts(config: HydrateConfig, source: S, pipeline: Pipeline<P, E, F>) -> Self {
        Self {
            config,
            source,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn config(&self) -> &HydrateConfig {
        &self.config
    }

    /// Hydrate every day from `start` to `end`, inclusive.
    ///
    /// Stops at the first day that fails; days already written stay on disk.
    #[instrument(level = "info", skip_all, fields(%start, %end))]
    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<RunSummary, Box<dyn Error>> {
        for dir in [&self.config.content_dir, &self.config.markup_dir] {
            if let Err(e) = ensure_writable_dir(dir).await {
                error!(
                    path = %dir.display(),
                    error = %e,
                    "Output directory is not writable (fix perms or choose a different path)"
                );
                return Err(e);
            }
        }

        let mut summary = RunSummary::default();
        for day in days(start, end) {
            match self.hydrate_day(day).await {
                Ok(day_summary) => summary.days.push(day_summary),
                Err(e) => {
                    error!(%day, error = %e, "Day failed; aborting run");
                    return Err(e.into());
                }
            }
        }

        let tally = summary.tally();
        info!(
            days = summary.days.len(),
            rows = summary.rows(),
            unreachable = tally.unreachable,
            failed = tally.failed,
            "Run complete"
        );
        Ok(summary)
    }

    /// Load, hydrate, merge and write one day.
    #[instrument(level = "info", skip_all, fields(%day))]
    pub async fn hydrate_day(&self, day: NaiveDate) -> Result<DaySummary, HydrateError> {
        let t0 = Instant::now();
        let prefix = &self.config.file_prefix;

        let dataset = self.source.load(day).await?;
        let urls = dataset.urls(&self.config.url_column)?;
        info!(urls = urls.len(), "Downloading and hydrating dataset");

        let (records, tally) =
            pool::run_with_tally(&self.pipeline, UrlTask::batch(urls), self.config.concurrency)
                .await;

        let (content, markup) = aggregate::merge(&dataset, records)?
            .split(self.config.content_includes_http_code);
        drop(dataset);

        write_table(&markup, &self.config.markup_dir.join(markup_file_name(prefix, day))).await?;
        drop(markup);
        write_table(&content, &self.config.content_dir.join(content_file_name(prefix, day))).await?;

        let elapsed = t0.elapsed();
        info!(
            rows = content.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Day hydrated"
        );
        Ok(DaySummary {
            day,
            rows: content.len(),
            tally,
            elapsed,
        })
    }
}
