//! Scripted rendering tier: drives a headless Chromium instance to obtain
//! content that the static tier could not.
//!
//! The rendering context is acquired lazily per invocation and released in
//! an unconditional cleanup phase; cleanup errors are logged, never raised.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::MiningConfig;
use crate::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const VIEWPORT_WIDTH: i64 = 1366;
const VIEWPORT_HEIGHT: i64 = 768;

/// URL patterns blocked when resource blocking is enabled.
const BLOCKED_RESOURCES: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.css", "*.woff",
    "*.woff2", "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3",
];

/// Removes scripts, stylesheets and inline styles before serialization.
const STRIP_SCRIPT: &str = r#"
(() => {
    document.querySelectorAll('script, style, link[rel="stylesheet"]').forEach(el => el.remove());
    document.querySelectorAll('[style]').forEach(el => el.removeAttribute('style'));
    return true;
})()
"#;

/// How long to wait for a page to settle, and what "settled" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitStrategy {
    /// Full load lifecycle.
    Load,
    /// DOM parsed; dynamic content may still be arriving.
    DomContentLoaded,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NavAttempt {
    pub wait: WaitStrategy,
    pub timeout: Duration,
}

/// The ordered navigation ladder: a strict attempt first, then a relaxed
/// wait condition with an extended timeout.
pub(crate) fn navigation_ladder(config: &MiningConfig) -> [NavAttempt; 2] {
    [
        NavAttempt {
            wait: WaitStrategy::Load,
            timeout: config.navigation_timeout,
        },
        NavAttempt {
            wait: WaitStrategy::DomContentLoaded,
            timeout: config.retry_navigation_timeout(),
        },
    ]
}

/// True when a navigation failure indicates the rendering context itself is
/// gone and must be re-acquired rather than retried in place.
pub(crate) fn is_detached_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("detached")
        || lower.contains("target closed")
        || lower.contains("session closed")
        || lower.contains("browser closed")
        || lower.contains("connection closed")
        || lower.contains("oneshot")
}

enum NavError {
    Timeout,
    Other(String),
}

impl NavError {
    fn message(&self) -> String {
        match self {
            NavError::Timeout => "navigation timeout".to_string(),
            NavError::Other(msg) => msg.clone(),
        }
    }
}

/// Headless rendering of a single URL.
pub struct PageRenderer {
    config: MiningConfig,
}

impl PageRenderer {
    pub fn new(config: MiningConfig) -> Self {
        Self { config }
    }

    /// Render `url` and return the serialized document with scripts and
    /// styles stripped. The browser is always torn down before returning.
    pub async fn render(
        &self,
        url: &str,
        target_selector: Option<&str>,
    ) -> Result<String, FetchError> {
        let mut session = RenderSession::launch(&self.config)
            .await
            .map_err(|e| FetchError::Other(format!("Failed to start rendering context: {e}")))?;

        let result = self.render_in_session(&mut session, url, target_selector).await;

        // Unconditional teardown, including on error paths above.
        session.close().await;

        result
    }

    async fn render_in_session(
        &self,
        session: &mut RenderSession,
        url: &str,
        target_selector: Option<&str>,
    ) -> Result<String, FetchError> {
        let mut last_error: Option<NavError> = None;
        let mut reacquired = false;
        let mut navigated = false;

        for attempt in navigation_ladder(&self.config) {
            debug!(url = %url, wait = ?attempt.wait, timeout = ?attempt.timeout, "Navigation attempt");

            match self.navigate(session.page()?, url, attempt).await {
                Ok(()) => {
                    navigated = true;
                    break;
                }
                Err(err) => {
                    if let NavError::Other(msg) = &err {
                        if is_detached_error(msg) && !reacquired {
                            warn!(url = %url, error = %msg, "Rendering context detached, re-acquiring page");
                            session.recreate_page(&self.config).await.map_err(|e| {
                                FetchError::Other(format!("Failed to re-acquire rendering context: {e}"))
                            })?;
                            reacquired = true;
                        }
                    }
                    last_error = Some(err);
                }
            }
        }

        if !navigated {
            return Err(match last_error {
                Some(NavError::Timeout) => FetchError::PageLoadTimeout,
                Some(NavError::Other(msg)) if msg.to_lowercase().contains("timeout") => {
                    FetchError::PageLoadTimeout
                }
                Some(NavError::Other(msg)) => FetchError::Other(msg),
                None => FetchError::PageLoadTimeout,
            });
        }

        let page = session.page()?;
        self.settle(page, url, target_selector).await;

        if let Err(e) = page.evaluate(STRIP_SCRIPT).await {
            warn!(url = %url, error = %e, "Failed to strip scripts and styles");
        }

        page.content()
            .await
            .map_err(|e| FetchError::Other(format!("Failed to serialize rendered page: {e}")))
    }

    async fn navigate(&self, page: &Page, url: &str, attempt: NavAttempt) -> Result<(), NavError> {
        let navigation = async {
            page.goto(url).await.map_err(|e| e.to_string())?;
            if attempt.wait == WaitStrategy::Load {
                page.wait_for_navigation().await.map_err(|e| e.to_string())?;
            }
            Ok::<(), String>(())
        };

        match timeout(attempt.timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(NavError::Other(msg)),
            Err(_) => Err(NavError::Timeout),
        }
    }

    /// Post-navigation settling: quiescence, then either the requested
    /// selector or a fixed interval. All waits here are best-effort.
    async fn settle(&self, page: &Page, url: &str, target_selector: Option<&str>) {
        if timeout(self.config.quiescence_timeout, page.wait_for_navigation())
            .await
            .is_err()
        {
            debug!(url = %url, "Network did not quiesce in time, proceeding");
        }

        match target_selector {
            Some(selector) => {
                let deadline = tokio::time::Instant::now() + self.config.selector_timeout;
                loop {
                    if page.find_element(selector).await.is_ok() {
                        debug!(url = %url, selector = %selector, "Target selector appeared");
                        break;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        debug!(url = %url, selector = %selector, "Target selector never appeared, proceeding");
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
            }
            None => tokio::time::sleep(self.config.settle_interval).await,
        }
    }
}

/// A launched browser plus its event handler task and current page.
struct RenderSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
}

impl RenderSession {
    async fn launch(config: &MiningConfig) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder()
            .headless_mode(HeadlessMode::New)
            .window_size(VIEWPORT_WIDTH as u32, VIEWPORT_HEIGHT as u32)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run");
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path.clone());
        }
        let browser_config = builder.build().map_err(anyhow::Error::msg)?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;

        // The handler stream must be polled for the browser connection to
        // make progress; aborted at teardown.
        let handler_task = tokio::task::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let mut session = Self {
            browser,
            handler: handler_task,
            page: None,
        };
        session.recreate_page(config).await?;
        Ok(session)
    }

    fn page(&self) -> Result<&Page, FetchError> {
        self.page
            .as_ref()
            .ok_or_else(|| FetchError::Other("Rendering context has no page".to_string()))
    }

    /// Discard the current page (if any) and open a fresh one with the
    /// standard environment applied.
    async fn recreate_page(&mut self, config: &MiningConfig) -> anyhow::Result<()> {
        if let Some(old) = self.page.take() {
            if let Err(e) = old.close().await {
                warn!(error = %e, "Failed to close stale page");
            }
        }

        let page = self.browser.new_page("about:blank").await?;

        page.execute(SetUserAgentOverrideParams {
            user_agent: USER_AGENT.to_string(),
            accept_language: Some("es-MX,es;q=0.9,en;q=0.8".to_string()),
            platform: Some("MacIntel".to_string()),
            user_agent_metadata: None,
        })
        .await?;

        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(VIEWPORT_WIDTH)
                .height(VIEWPORT_HEIGHT)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(anyhow::Error::msg)?,
        )
        .await?;

        if config.block_resources {
            page.execute(SetBlockedUrLsParams {
                urls: BLOCKED_RESOURCES.iter().map(|s| s.to_string()).collect(),
            })
            .await?;
        }

        self.page = Some(page);
        Ok(())
    }

    /// Close page then browser. Tolerates everything, including resources
    /// that are already gone.
    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(error = %e, "Failed to close page during cleanup");
            }
        }

        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser during cleanup");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Failed to wait for browser exit during cleanup");
        }

        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_relaxes_wait_and_extends_timeout() {
        let config = MiningConfig {
            navigation_timeout: Duration::from_secs(20),
            ..Default::default()
        };
        let ladder = navigation_ladder(&config);
        assert_eq!(ladder[0].wait, WaitStrategy::Load);
        assert_eq!(ladder[0].timeout, Duration::from_secs(20));
        assert_eq!(ladder[1].wait, WaitStrategy::DomContentLoaded);
        assert_eq!(ladder[1].timeout, Duration::from_secs(30));
    }

    #[test]
    fn detached_errors_are_recognized() {
        assert!(is_detached_error("Target closed before navigation"));
        assert!(is_detached_error("session closed: oneshot canceled"));
        assert!(is_detached_error("Frame detached from browser"));
        assert!(!is_detached_error("net::ERR_NAME_NOT_RESOLVED"));
    }
}
