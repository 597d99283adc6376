//! Browser session manager: one browser process and one page per render.
//!
//! The backend is reached only through the three traits below so the pipeline
//! can be driven by a scripted browser in tests. `ChromeLauncher` in
//! `render::chrome` is the production implementation; a pooled launcher would
//! plug in at `BrowserLauncher` without changing the one-page-per-render contract.
//!
//! Teardown guarantee: `BrowserSession::close` runs the teardown at most once.
//! If a session is dropped before `close` was awaited (cancelled request,
//! panic), `Drop` schedules the same teardown on the runtime. Each teardown
//! step is bounded by the page timeout, and a step that fails or hangs does
//! not keep the next one from running.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::render::assemble::AssembledDocument;
use crate::render::error::{BrowserError, RenderError, RenderStage};
use crate::render::export::PdfOptions;
use crate::render::geometry::{LETTER_HEIGHT_PX, LETTER_WIDTH_PX};

// ────────────────────────────────────────────────────────────────────────────
// Backend traits
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserHandle>, BrowserError>;
}

#[async_trait]
pub trait BrowserHandle: Send + Sync {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>, BrowserError>;
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), BrowserError>;
    async fn set_content(&self, html: &str) -> Result<(), BrowserError>;
    /// Evaluates `script` in the page, awaiting it if it returns a promise.
    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;
    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError>;
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Options
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Letter at 96 DPI. The height is provisional; the PDF is sized from
    /// the measured content, not from the viewport.
    pub fn letter() -> Self {
        Self {
            width: LETTER_WIDTH_PX,
            height: LETTER_HEIGHT_PX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub launch_timeout: Duration,
    /// Default bound for navigation and every page operation.
    pub page_timeout: Duration,
    /// Quiet period with no network activity before content counts as loaded.
    pub network_idle: Duration,
    pub viewport: Viewport,
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// What teardown managed to close. Failures are logged, never propagated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub page_closed: bool,
    pub browser_closed: bool,
}

pub struct BrowserSession {
    browser: Option<Box<dyn BrowserHandle>>,
    page: Option<Box<dyn PageHandle>>,
    options: LaunchOptions,
    closed: bool,
}

impl BrowserSession {
    /// Starts a browser process. A session returned from here is "launched"
    /// and owes exactly one teardown.
    pub async fn launch(
        launcher: &dyn BrowserLauncher,
        options: LaunchOptions,
    ) -> Result<Self, RenderError> {
        let browser = bounded(
            RenderStage::Launch,
            options.launch_timeout,
            launcher.launch(&options),
        )
        .await?;
        debug!("Browser launched");
        Ok(Self {
            browser: Some(browser),
            page: None,
            options,
            closed: false,
        })
    }

    /// Opens the single page this session renders into and sizes its viewport.
    pub async fn open_page(&mut self) -> Result<(), RenderError> {
        let limit = self.options.page_timeout;
        let viewport = self.options.viewport;
        let browser = self.browser.as_mut().ok_or_else(|| RenderError::Unknown {
            stage: RenderStage::OpenPage,
            message: "browser session already closed".to_string(),
        })?;

        let page = bounded(RenderStage::OpenPage, limit, browser.new_page()).await?;
        // keep the page before configuring it so teardown sees it even if
        // setting the viewport fails
        let page = self.page.insert(page);
        bounded(RenderStage::OpenPage, limit, page.set_viewport(viewport)).await?;
        debug!(width = viewport.width, height = viewport.height, "Page opened");
        Ok(())
    }

    /// Sets the page content and waits for the network to go quiet.
    pub async fn load(&self, document: &AssembledDocument) -> Result<(), RenderError> {
        let page = self.page(RenderStage::LoadContent)?;
        let idle_script = network_idle_script(self.options.network_idle);
        bounded(RenderStage::LoadContent, self.options.page_timeout, async {
            page.set_content(document.as_str()).await?;
            page.evaluate(&idle_script).await?;
            Ok(())
        })
        .await?;
        debug!(bytes = document.len(), "Content loaded");
        Ok(())
    }

    pub fn page(&self, stage: RenderStage) -> Result<&dyn PageHandle, RenderError> {
        self.page.as_deref().ok_or_else(|| RenderError::Unknown {
            stage,
            message: "no page open in browser session".to_string(),
        })
    }

    pub fn page_timeout(&self) -> Duration {
        self.options.page_timeout
    }

    /// Closes the page, then the browser. Each step is attempted regardless of
    /// the other's outcome. Later calls are no-ops.
    pub async fn close(&mut self) -> TeardownReport {
        if self.closed {
            return TeardownReport::default();
        }
        self.closed = true;
        teardown(self.page.take(), self.browser.take(), self.options.page_timeout).await
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let page = self.page.take();
        let browser = self.browser.take();
        if page.is_none() && browser.is_none() {
            return;
        }
        warn!("Browser session dropped before close; scheduling teardown");
        let limit = self.options.page_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(teardown(page, browser, limit));
            }
            Err(_) => warn!("No async runtime available; browser process is reaped on drop"),
        }
    }
}

async fn teardown(
    page: Option<Box<dyn PageHandle>>,
    browser: Option<Box<dyn BrowserHandle>>,
    limit: Duration,
) -> TeardownReport {
    let mut report = TeardownReport::default();
    if let Some(page) = page {
        match tokio::time::timeout(limit, page.close()).await {
            Ok(Ok(())) => report.page_closed = true,
            Ok(Err(e)) => warn!(error = %e, "Failed to close page"),
            Err(_) => warn!(?limit, "Timed out closing page"),
        }
    }
    if let Some(browser) = browser {
        match tokio::time::timeout(limit, browser.close()).await {
            Ok(Ok(())) => report.browser_closed = true,
            Ok(Err(e)) => warn!(error = %e, "Failed to close browser"),
            Err(_) => warn!(?limit, "Timed out closing browser"),
        }
    }
    debug!(?report, "Browser session closed");
    report
}

/// Runs a backend operation under `limit`, mapping both the elapsed bound and
/// the backend failure to the taxonomy for `stage`.
pub(crate) async fn bounded<T, F>(stage: RenderStage, limit: Duration, op: F) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, BrowserError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(|e| RenderError::from_browser(stage, e)),
        Err(_) => Err(RenderError::timed_out(stage)),
    }
}

/// Resolves once the document is complete and no resource has finished
/// loading for `idle`. Never resolves on its own otherwise; the caller bounds it.
///
/// This approximates "no requests in flight for `idle`": the resource timing
/// buffer only lists finished requests, so one still in flight is invisible
/// until it completes.
fn network_idle_script(idle: Duration) -> String {
    format!(
        r#"(async () => {{
    const idleMs = {idle_ms};
    const lastActivity = () => performance
        .getEntriesByType('resource')
        .reduce((latest, entry) => Math.max(latest, entry.responseEnd), 0);
    for (;;) {{
        if (document.readyState === 'complete' && performance.now() - lastActivity() >= idleMs) {{
            return true;
        }}
        await new Promise((resolve) => setTimeout(resolve, 100));
    }}
}})()"#,
        idle_ms = idle.as_millis()
    )
}
