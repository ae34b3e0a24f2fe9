//! The concurrent fetch-verify-extract-fallback engine.
//!
//! Each URL goes through the same stages, leaves first:
//!
//! 1. **Probe** ([`probe`]): a `HEAD` request. A 404 or any transport
//!    failure marks the URL unreachable and ends its run.
//! 2. **Primary extraction** ([`extract`], [`nlp`]): download and parse
//!    the article into title, authors, keywords, summary, text and media.
//! 3. **Fallback** ([`fallback`]): re-fetch raw markup when the primary
//!    extraction succeeded without any.
//!
//! [`pipeline`] sequences those stages for one URL and [`pool`] runs the
//! pipeline over a whole batch with a fixed concurrency budget.
//!
//! # Common Patterns
//!
//! Each stage is a trait (`Prober`, `Extractor`, `RawFetcher`) with one
//! `reqwest`-backed implementation, so tests can swap in counting stubs.

pub mod extract;
pub mod fallback;
pub mod nlp;
pub mod pipeline;
pub mod pool;
pub mod probe;

pub use extract::{ArticleExtractor, Extractor};
pub use fallback::{HtmlFallback, RawFetcher};
pub use pipeline::{Outcome, Pipeline, Terminal};
pub use pool::{DEFAULT_CONCURRENCY, Tally};
pub use probe::{DEFAULT_PROBE_TIMEOUT, HttpProber, Prober};

/// The pipeline wired to real HTTP stages.
pub type HttpPipeline = Pipeline<HttpProber, ArticleExtractor, HtmlFallback>;
