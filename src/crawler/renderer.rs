//! Page rendering through a headless browser
//!
//! The source renders its quotes client-side, so plain HTTP fetches see an
//! empty shell. [`ChromeRenderer`] drives Chrome over CDP and only hands a
//! document back once rendering has visibly finished.

use crate::config::{BrowserConfig, CrawlerConfig, SourceConfig};
use crate::HarvestError;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Markup of the current page at the moment it was read
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Address the browser reports for the page
    pub url: String,
    pub html: String,
}

/// A browser session that the pagination controller drives
///
/// Implementations own their session exclusively; callers must invoke
/// [`PageRenderer::close`] on every exit path.
#[allow(async_fn_in_trait)]
pub trait PageRenderer {
    /// Loads `url`, failing with [`HarvestError::Navigation`] on error or timeout
    async fn open(&mut self, url: &str) -> Result<(), HarvestError>;

    /// Returns the rendered markup once quotes or the "no more pages" state are visible
    async fn current_document(&mut self) -> Result<RenderedPage, HarvestError>;

    /// Activates the next-page control
    ///
    /// Returns `Ok(false)` when there is no such control.
    async fn advance(&mut self) -> Result<bool, HarvestError>;

    /// Releases the browser session; calling it twice is harmless
    async fn close(&mut self) -> Result<(), HarvestError>;
}

/// Polls `probe` every `interval` until it returns true or `timeout` passes
///
/// Returns whether the condition was observed in time.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(timeout, async {
        loop {
            if probe().await {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    })
    .await
    .is_ok()
}

/// Quotes a string as a JavaScript string literal
fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

const PENDING_MARKER: &str = "__quoteHarvestPending";

/// Scripts evaluated inside the page, built from the configured selectors
#[derive(Debug, Clone)]
struct PageScripts {
    ready: String,
    has_quotes: String,
    click_next: String,
    navigated: String,
}

impl PageScripts {
    fn new(source: &SourceConfig) -> Self {
        let quote = js_string(&source.quote_selector);
        let next = js_string(&source.next_selector);
        let marker = PENDING_MARKER;

        // Before loading completes "no next control" is meaningless, hence the readyState guard
        let ready = format!(
            "document.readyState === 'complete' && \
             (document.querySelector({quote}) !== null || document.querySelector({next}) === null)"
        );

        let has_quotes = format!("document.querySelector({quote}) !== null");

        let click_next = format!(
            "(() => {{ \
                const next = document.querySelector({next}); \
                if (!next) {{ return false; }} \
                window.{marker} = true; \
                next.click(); \
                return true; \
            }})()"
        );

        // The marker lives on the old window and disappears once the next document replaces it
        let navigated = format!("window.{marker} !== true");

        Self {
            ready,
            has_quotes,
            click_next,
            navigated,
        }
    }
}

/// Headless Chrome session driven over the DevTools protocol
pub struct ChromeRenderer {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    page: Option<Page>,
    scripts: PageScripts,
    page_timeout: Duration,
    poll_interval: Duration,
    settle_delay: Duration,
    empty_page_grace: Duration,
    closed: bool,
}

impl ChromeRenderer {
    /// Launches a browser configured for unattended operation
    ///
    /// # Arguments
    ///
    /// * `browser` - Headless, GPU, sandbox, and executable options
    /// * `crawler` - Per-step timeout and readiness polling settings
    /// * `source` - Selectors used by the readiness and next-page scripts
    pub async fn launch(
        browser: &BrowserConfig,
        crawler: &CrawlerConfig,
        source: &SourceConfig,
    ) -> Result<Self, HarvestError> {
        let page_timeout = Duration::from_millis(crawler.page_timeout_ms);

        let mut builder = CdpBrowserConfig::builder().request_timeout(page_timeout);
        if !browser.headless {
            builder = builder.with_head();
        }
        if browser.disable_gpu {
            builder = builder.arg("--disable-gpu");
        }
        if browser.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &browser.executable {
            builder = builder.chrome_executable(executable);
        }
        let cdp_config = builder.build().map_err(HarvestError::Browser)?;

        let (cdp_browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        tracing::debug!(
            "Browser launched (headless: {}, no-sandbox: {})",
            browser.headless,
            browser.no_sandbox
        );

        Ok(Self {
            browser: cdp_browser,
            handler_task: Some(handler_task),
            page: None,
            scripts: PageScripts::new(source),
            page_timeout,
            poll_interval: Duration::from_millis(crawler.poll_interval_ms),
            settle_delay: Duration::from_millis(crawler.settle_delay_ms),
            empty_page_grace: Duration::from_millis(crawler.empty_page_grace_ms),
            closed: false,
        })
    }

    fn page(&self) -> Result<&Page, HarvestError> {
        self.page
            .as_ref()
            .ok_or_else(|| HarvestError::Browser("No page is open".to_string()))
    }

    async fn current_url(page: &Page) -> String {
        page.url().await.ok().flatten().unwrap_or_default()
    }

    /// Evaluates a boolean expression; evaluation errors read as `false`
    ///
    /// Errors are expected while a navigation tears down the execution context.
    async fn probe(page: &Page, script: &str) -> bool {
        match page.evaluate(script).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                tracing::trace!("Probe not ready: {}", e);
                false
            }
        }
    }
}

impl PageRenderer for ChromeRenderer {
    async fn open(&mut self, url: &str) -> Result<(), HarvestError> {
        let navigation = tokio::time::timeout(self.page_timeout, self.browser.new_page(url)).await;

        let page = match navigation {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                return Err(HarvestError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(HarvestError::Navigation {
                    url: url.to_string(),
                    message: format!("page did not load within {:?}", self.page_timeout),
                })
            }
        };

        tracing::debug!("Opened {}", url);
        self.page = Some(page);
        Ok(())
    }

    async fn current_document(&mut self) -> Result<RenderedPage, HarvestError> {
        let page = self.page()?;
        let ready_script = self.scripts.ready.as_str();

        let ready = poll_until(self.page_timeout, self.poll_interval, || {
            Self::probe(page, ready_script)
        })
        .await;

        let url = Self::current_url(page).await;
        if !ready {
            return Err(HarvestError::Navigation {
                url,
                message: format!("quotes did not render within {:?}", self.page_timeout),
            });
        }

        // Without a next control the page reads as ready before its quotes render
        let quotes_script = self.scripts.has_quotes.as_str();
        if !Self::probe(page, quotes_script).await {
            let rendered = poll_until(self.empty_page_grace, self.poll_interval, || {
                Self::probe(page, quotes_script)
            })
            .await;
            if !rendered {
                tracing::debug!("No quote blocks on {} after {:?}", url, self.empty_page_grace);
            }
        }

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let html = page.content().await.map_err(|e| HarvestError::Navigation {
            url: url.clone(),
            message: format!("failed to read page content: {}", e),
        })?;

        tracing::debug!("Rendered {} ({} bytes)", url, html.len());
        Ok(RenderedPage { url, html })
    }

    async fn advance(&mut self) -> Result<bool, HarvestError> {
        let page = self.page()?;
        let from = Self::current_url(page).await;

        let clicked = page
            .evaluate(self.scripts.click_next.as_str())
            .await
            .map_err(|e| HarvestError::Navigation {
                url: from.clone(),
                message: format!("failed to activate next-page control: {}", e),
            })?
            .into_value::<bool>()
            .map_err(|e| HarvestError::Browser(format!("Unexpected script result: {}", e)))?;

        if !clicked {
            return Ok(false);
        }

        let navigated_script = self.scripts.navigated.as_str();
        let navigated = poll_until(self.page_timeout, self.poll_interval, || {
            Self::probe(page, navigated_script)
        })
        .await;

        if !navigated {
            return Err(HarvestError::Navigation {
                url: from,
                message: format!("next page did not load within {:?}", self.page_timeout),
            });
        }

        tracing::debug!("Advanced from {} to {}", from, Self::current_url(page).await);
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), HarvestError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close page: {}", e);
            }
        }

        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Failed to wait for browser exit: {}", e);
        }
        if let Some(task) = self.handler_task.take() {
            let _ = task.await;
        }

        closed.map_err(|e| HarvestError::Browser(format!("Failed to close browser: {}", e)))?;
        tracing::debug!("Browser session closed");
        Ok(())
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}
