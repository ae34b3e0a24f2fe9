//! Reachability prober.
//!
//! A `HEAD` request tells us whether a page is worth downloading at all.
//! Dead links are the bulk of a day's GDELT URLs, so skipping them here is
//! the single biggest saving in a hydration run.

use crate::models::ProbeResult;
use reqwest::Client;
use reqwest::redirect::Policy;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lightweight existence check for a URL.
///
/// Implementations must not fail: anything that prevents a status from
/// being read is reported as [`ProbeResult::unreachable`].
pub trait Prober: Send + Sync {
    fn probe(&self, url: &str) -> impl Future<Output = ProbeResult> + Send;
}

/// [`Prober`] that issues a `HEAD` request with a bounded timeout.
///
/// Redirects are not followed; the status of the URL itself is recorded.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    /// Build a prober with its own non-redirecting client.
    ///
    /// # Errors
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }
}

impl Prober for HttpProber {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn probe(&self, url: &str) -> ProbeResult {
        match self.client.head(url).timeout(self.timeout).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(status, "Probe answered");
                ProbeResult::new(status)
            }
            Err(e) => {
                debug!(error = %e, "Connection error or timeout; treating as unreachable");
                ProbeResult::unreachable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn prober(timeout: Duration) -> HttpProber {
        HttpProber::new("gdelt_hydrator-test", timeout).unwrap()
    }

    #[tokio::test]
    async fn test_probe_reports_status() {
        let server = test_support::serve(200, "text/html", "<html></html>").await;
        let result = prober(DEFAULT_PROBE_TIMEOUT).probe(&server.url("/a")).await;
        assert_eq!(result.status_code, 200);
    }

    #[tokio::test]
    async fn test_probe_passes_through_real_404() {
        let server = test_support::serve(404, "text/html", "").await;
        let result = prober(DEFAULT_PROBE_TIMEOUT).probe(&server.url("/gone")).await;
        assert!(result.is_unreachable());
    }

    #[tokio::test]
    async fn test_probe_keeps_other_errors() {
        let server = test_support::serve(503, "text/html", "").await;
        let result = prober(DEFAULT_PROBE_TIMEOUT).probe(&server.url("/busy")).await;
        assert_eq!(result.status_code, 503);
    }

    #[tokio::test]
    async fn test_probe_unresolvable_host_is_unreachable() {
        let result = prober(Duration::from_secs(5))
            .probe("http://does-not-exist.invalid/story")
            .await;
        assert!(result.is_unreachable());
    }

    #[tokio::test]
    async fn test_probe_malformed_url_is_unreachable() {
        let result = prober(DEFAULT_PROBE_TIMEOUT).probe("not a url").await;
        assert!(result.is_unreachable());
        let result = prober(DEFAULT_PROBE_TIMEOUT).probe("").await;
        assert!(result.is_unreachable());
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unreachable() {
        let server = test_support::serve_silent().await;
        let result = prober(Duration::from_millis(200)).probe(&server.url("/hang")).await;
        assert!(result.is_unreachable());
        assert_eq!(server.hits(), 1);
    }
}
