//! Per-URL hydration state machine.
//!
//! ```text
//! Start -> Probed -+-> (404) ---------------------------------> Unreachable
//!                  |
//!                  +-> Extracting -+-> markup present ---------> Extracted
//!                                  +-> no markup -> fallback --> ExtractedWithFallback
//!                                  +-> failure ----------------> Failed
//! ```
//!
//! Every path ends in an [`ExtractionRecord`]; no error leaves
//! [`Pipeline::process`]. Nothing is retried here.

use super::extract::Extractor;
use super::fallback::RawFetcher;
use super::probe::Prober;
use crate::models::{ExtractionRecord, Markup, UrlTask};
use tracing::{debug, instrument, warn};

/// Terminal state reached by one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Probe returned the 404 sentinel; extraction was skipped.
    Unreachable,
    /// Primary extraction produced content and markup.
    Extracted,
    /// Primary extraction had no markup and the fallback ran.
    /// `recovered` is false when the fallback failed too.
    ExtractedWithFallback { recovered: bool },
    /// Primary extraction failed; only the status code is kept.
    Failed,
}

/// The terminal record for one URL and the state that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub state: Terminal,
    pub record: ExtractionRecord,
}

/// Probe, extract, and backfill markup for one URL at a time.
///
/// Owns its three stages by value; the worker pool shares it by reference.
#[derive(Debug, Clone)]
pub struct Pipeline<P, E, F> {
    prober: P,
    extractor: E,
    fallback: F,
}

impl<P, E, F> Pipeline<P, E, F>
where
    P: Prober,
    E: Extractor,
    F: RawFetcher,
{
    pub fn new(prober: P, extractor: E, fallback: F) -> Self {
        Self {
            prober,
            extractor,
            fallback,
        }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    /// Run one URL through to its terminal record.
    #[instrument(level = "debug", skip_all, fields(index = task.index, url = %task.url))]
    pub async fn process(&self, task: &UrlTask) -> Outcome {
        let probe = self.prober.probe(&task.url).await;
        if probe.is_unreachable() {
            debug!("Got 404, skipping extraction");
            return Outcome {
                state: Terminal::Unreachable,
                record: ExtractionRecord::unreachable(),
            };
        }
        let code = probe.status_code;

        let mut article = match self.extractor.extract(&task.url).await {
            Ok(article) => article,
            Err(e) => {
                warn!(status = code, error = %e, "Extraction failed; keeping status only");
                return Outcome {
                    state: Terminal::Failed,
                    record: ExtractionRecord::empty(code),
                };
            }
        };

        match std::mem::replace(&mut article.markup, Markup::Unset) {
            Markup::Present(markup) => {
                debug!(status = code, "Extraction completed");
                Outcome {
                    state: Terminal::Extracted,
                    record: article.into_record(markup, code),
                }
            }
            missing => {
                debug!(markup = missing.label(), "Extraction completed without markup; fetching raw page");
                let (markup, recovered) = match self.fallback.fetch_raw_markup(&task.url).await {
                    Ok(markup) => (markup, true),
                    Err(e) => {
                        warn!(error = %e, "Raw markup fetch failed; keeping extracted fields");
                        (String::new(), false)
                    }
                };
                Outcome {
                    state: Terminal::ExtractedWithFallback { recovered },
                    record: article.into_record(markup, code),
                }
            }
        }
    }
}
