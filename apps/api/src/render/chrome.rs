//! Headless Chrome/Chromium backend over CDP (chromiumoxide).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::render::error::BrowserError;
use crate::render::export::PdfOptions;
use crate::render::session::{BrowserHandle, BrowserLauncher, LaunchOptions, PageHandle, Viewport};

/// Flags for running inside containers with constrained shared memory and no GPU.
const STABILITY_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--js-flags=--max-old-space-size=4096",
];

/// Launches a fresh headless browser process per render.
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    /// `executable` overrides chromiumoxide's own binary detection.
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserHandle>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(options.viewport.width, options.viewport.height)
            .launch_timeout(options.launch_timeout)
            .request_timeout(options.page_timeout)
            .args(STABILITY_ARGS.iter().copied());
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::Protocol)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;

        let closing = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&closing);
        // Drives the CDP connection. Ending means the process or socket went away;
        // that is only worth a warning when nobody asked for it.
        let observer = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
            if observed.load(Ordering::SeqCst) {
                debug!("Browser connection closed");
            } else {
                warn!("Browser disconnected unexpectedly");
            }
        });

        info!("Headless browser launched");
        Ok(Box::new(ChromeBrowser {
            browser,
            observer,
            closing,
            close_timeout: options.page_timeout,
        }))
    }
}

struct ChromeBrowser {
    browser: Browser,
    observer: JoinHandle<()>,
    closing: Arc<AtomicBool>,
    /// Bound for the polite close and for reaping the child afterwards.
    close_timeout: Duration,
}

#[async_trait]
impl BrowserHandle for ChromeBrowser {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_error)?;
        Ok(Box::new(ChromePage { page }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let ChromeBrowser {
            mut browser,
            observer,
            closing,
            close_timeout,
        } = *self;
        closing.store(true, Ordering::SeqCst);

        let closed = match tokio::time::timeout(close_timeout, browser.close()).await {
            Ok(result) => result.map(|_| ()).map_err(browser_error),
            Err(_) => Err(BrowserError::TimedOut(format!(
                "browser did not close within {close_timeout:?}"
            ))),
        };
        if closed.is_err() {
            // a wedged process never exits on its own
            if let Some(Err(e)) = browser.kill().await {
                warn!(error = %e, "Failed to kill browser process");
            }
        }
        match tokio::time::timeout(close_timeout, browser.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to reap browser process"),
            Err(_) => warn!(?close_timeout, "Timed out reaping browser process"),
        }
        observer.abort();
        closed
    }
}

struct ChromePage {
    page: Page,
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), BrowserError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(viewport.width))
            .height(i64::from(viewport.height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(BrowserError::Protocol)?;
        self.page.execute(params).await.map_err(browser_error)?;
        Ok(())
    }

    async fn set_content(&self, html: &str) -> Result<(), BrowserError> {
        self.page.set_content(html).await.map_err(browser_error)?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(BrowserError::Protocol)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(browser_error)?;
        result
            .into_value::<Value>()
            .map_err(|e| BrowserError::Protocol(format!("unreadable evaluation result: {e}")))
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError> {
        let params = PrintToPdfParams {
            paper_width: Some(options.paper_width_in),
            paper_height: Some(options.paper_height_in),
            margin_top: Some(options.margin_in),
            margin_bottom: Some(options.margin_in),
            margin_left: Some(options.margin_in),
            margin_right: Some(options.margin_in),
            print_background: Some(options.print_background),
            prefer_css_page_size: Some(options.prefer_css_page_size),
            page_ranges: Some(options.page_ranges.clone()),
            ..Default::default()
        };
        self.page.pdf(params).await.map_err(browser_error)
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.page.close().await.map_err(browser_error)
    }
}

/// Sorts CDP failures by kind where chromiumoxide tells us; everything else
/// keeps its message for classification further up.
fn browser_error(err: CdpError) -> BrowserError {
    match &err {
        CdpError::Timeout => BrowserError::TimedOut(err.to_string()),
        CdpError::Ws(_) | CdpError::NoResponse | CdpError::ChannelSendError(_) => {
            BrowserError::Disconnected(err.to_string())
        }
        _ => BrowserError::Protocol(err.to_string()),
    }
}
