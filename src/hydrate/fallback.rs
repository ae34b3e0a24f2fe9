//! Fallback raw-markup fetcher.
//!
//! Some sites come through the primary extractor with usable text but no
//! markup. For those the page is fetched again and run through the html5ever
//! tree builder, which repairs markup the way a browser would, so that at
//! least the raw page is kept for later site-specific processing.

use super::extract::is_markup_type;
use crate::error::FetchFailure;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use std::future::Future;
use tracing::{debug, instrument};
use url::Url;

/// Largest body the fallback will download and reparse.
pub const MAX_RAW_BYTES: u64 = 16 * 1024 * 1024;

/// Independent full-body fetch that recovers a page's markup.
pub trait RawFetcher: Send + Sync {
    fn fetch_raw_markup(&self, url: &str) -> impl Future<Output = Result<String, FetchFailure>> + Send;
}

/// [`RawFetcher`] that re-downloads the page and re-serializes the parsed
/// document.
///
/// The response status is not checked: an error page's markup is still
/// markup. Responses that declare a non-markup content type (a PDF, an
/// image) or a length over [`MAX_RAW_BYTES`] are refused before the body is
/// read, since reparsing them would only produce mangled text.
#[derive(Debug, Clone)]
pub struct HtmlFallback {
    client: Client,
}

impl HtmlFallback {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl RawFetcher for HtmlFallback {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_raw_markup(&self, url: &str) -> Result<String, FetchFailure> {
        let page = Url::parse(url).map_err(|e| FetchFailure::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let response = self
            .client
            .get(page)
            .send()
            .await
            .map_err(FetchFailure::Request)?;
        let status = response.status().as_u16();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        if let Some(ct) = content_type {
            if !is_markup_type(&ct) {
                return Err(FetchFailure::NotMarkup(ct));
            }
        }
        if let Some(bytes) = response.content_length().filter(|n| *n > MAX_RAW_BYTES) {
            return Err(FetchFailure::TooLarge {
                bytes,
                limit: MAX_RAW_BYTES,
            });
        }

        let body = response.text().await.map_err(FetchFailure::Body)?;
        let raw_bytes = body.len();
        let markup = tokio::task::spawn_blocking(move || reparse(&body))
            .await
            .map_err(FetchFailure::Parse)?;
        debug!(status, raw_bytes, bytes = markup.len(), "Recovered raw markup");
        Ok(markup)
    }
}

/// Parse leniently and serialize the repaired document.
pub fn reparse(body: &str) -> String {
    Html::parse_document(body).html()
}
