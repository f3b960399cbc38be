//! Content acquisition: static HTTP fetch with a scripted-rendering fallback.
//!
//! The static tier is cheap and covers server-rendered sites; when its
//! output looks like a client-side shell the dynamic tier renders the page
//! in headless Chromium. All failure paths produce a classified
//! [`FetchError`] rather than a panic or an unclassified error.

pub mod heuristics;
pub mod renderer;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MiningConfig;
use crate::error::FetchError;
use crate::types::{FetchMethod, FetchedContent};

use heuristics::incomplete_reason;
use renderer::PageRenderer;

/// Per-invocation acquisition options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// CSS selector to wait for after scripted navigation (best-effort).
    pub target_selector: Option<String>,
}

/// Seam for the acquisition stage, mockable in tests.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn acquire(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedContent, FetchError>;
}

/// Production fetcher: reqwest static tier + chromiumoxide dynamic tier.
pub struct WebContentFetcher {
    client: reqwest::Client,
    renderer: PageRenderer,
    config: MiningConfig,
}

impl WebContentFetcher {
    pub fn new(config: MiningConfig) -> anyhow::Result<Self> {
        // Browser-like headers; some event sites refuse obvious bots.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".parse()?,
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "es-MX,es;q=0.9,en;q=0.8".parse()?,
        );

        let client = reqwest::Client::builder()
            .user_agent(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            )
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            renderer: PageRenderer::new(config.clone()),
            config,
        })
    }

    fn validate_url(url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl)?;
        if parsed.host_str().is_none() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl);
        }
        Ok(parsed)
    }

    /// Lightweight fetch with its own short timeout, independent of the
    /// scripted tier's timeouts.
    async fn fetch_static(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.config.static_timeout)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Other(e.to_string()))
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::StaticTimeout
    } else if e.is_connect() {
        FetchError::ConnectionFailed
    } else {
        FetchError::Other(e.to_string())
    }
}

#[async_trait]
impl ContentFetcher for WebContentFetcher {
    async fn acquire(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedContent, FetchError> {
        let parsed = Self::validate_url(url)?;
        let selector = options.target_selector.as_deref();

        match self.fetch_static(&parsed).await {
            Ok(body) => match incomplete_reason(&body) {
                None => {
                    debug!(url = %url, bytes = body.len(), "Static fetch complete");
                    Ok(FetchedContent::new(FetchMethod::Static, body))
                }
                Some(reason) => {
                    info!(url = %url, reason = %reason, "Static content incomplete, rendering");
                    match self.renderer.render(url, selector).await {
                        Ok(html) => Ok(FetchedContent::new(FetchMethod::Dynamic, html)),
                        Err(e) => {
                            // The incomplete static body is still better than
                            // nothing when rendering fails.
                            warn!(url = %url, error = %e, "Rendering failed, using incomplete static content");
                            Ok(FetchedContent::new(FetchMethod::Static, body))
                        }
                    }
                }
            },
            // A domain the static tier cannot reach is unreachable for the
            // browser as well; do not burn a rendering context on it.
            Err(FetchError::ConnectionFailed) => Err(FetchError::ConnectionFailed),
            Err(static_err) => {
                info!(url = %url, error = %static_err, "Static fetch failed, rendering");
                match self.renderer.render(url, selector).await {
                    Ok(html) => Ok(FetchedContent::new(FetchMethod::Dynamic, html)),
                    Err(render_err) => Err(render_err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_rejected_without_network() {
        let fetcher = WebContentFetcher::new(MiningConfig::default()).unwrap();
        let err = fetcher
            .acquire("not a url", &FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid URL format");
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected() {
        let fetcher = WebContentFetcher::new(MiningConfig::default()).unwrap();
        let err = fetcher
            .acquire("ftp://example.com/events", &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl));
    }

    #[test]
    fn validate_url_accepts_https() {
        assert!(WebContentFetcher::validate_url("https://eventos.mx/cartelera").is_ok());
        assert!(WebContentFetcher::validate_url("javascript:alert(1)").is_err());
    }
}
