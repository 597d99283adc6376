//! Scripted in-memory browser backend for tests.
//!
//! Every handle shares a `Ledger` so tests can assert how many processes were
//! launched and how many pages and browsers were closed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::render::error::BrowserError;
use crate::render::export::PdfOptions;
use crate::render::session::{BrowserHandle, BrowserLauncher, LaunchOptions, PageHandle, Viewport};

pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n%fake\n%%EOF\n";

#[derive(Debug, Clone)]
pub struct Script {
    /// Largest of the three height readings the page reports.
    pub content_height_px: f64,
    pub fonts_api: bool,
    /// The page dies right after content finished loading.
    pub crash_after_load: bool,
    pub load_delay: Option<Duration>,
    pub launch_fails: bool,
    pub export_fails: bool,
    pub export_delay: Option<Duration>,
    /// `close` on the page never resolves.
    pub page_close_hangs: bool,
    /// `close` on the browser never resolves.
    pub browser_close_hangs: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            content_height_px: 400.0,
            fonts_api: true,
            crash_after_load: false,
            load_delay: None,
            launch_fails: false,
            export_fails: false,
            export_delay: None,
            page_close_hangs: false,
            browser_close_hangs: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    pub launches: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub page_closes: AtomicUsize,
    pub browser_closes: AtomicUsize,
    pub viewport: Mutex<Option<Viewport>>,
    pub loaded_html: Mutex<Option<String>>,
    pub printed: Mutex<Vec<PdfOptions>>,
}

impl Ledger {
    pub fn loaded_html(&self) -> Option<String> {
        self.loaded_html.lock().unwrap().clone()
    }

    pub fn printed(&self) -> Vec<PdfOptions> {
        self.printed.lock().unwrap().clone()
    }

    /// Every launched browser has been closed.
    pub fn all_closed(&self) -> bool {
        self.launches.load(Ordering::SeqCst) == self.browser_closes.load(Ordering::SeqCst)
            && self.pages_opened.load(Ordering::SeqCst) == self.page_closes.load(Ordering::SeqCst)
    }
}

pub struct FakeLauncher {
    script: Script,
    ledger: Arc<Ledger>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ledger: Arc::new(Ledger::default()),
        }
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserHandle>, BrowserError> {
        self.ledger.launches.fetch_add(1, Ordering::SeqCst);
        if self.script.launch_fails {
            return Err(BrowserError::Protocol(
                "Failed to launch the browser process".to_string(),
            ));
        }
        Ok(Box::new(FakeBrowser {
            script: self.script.clone(),
            ledger: Arc::clone(&self.ledger),
            crashed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct FakeBrowser {
    script: Script,
    ledger: Arc<Ledger>,
    crashed: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>, BrowserError> {
        self.ledger.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            script: self.script.clone(),
            ledger: Arc::clone(&self.ledger),
            crashed: Arc::clone(&self.crashed),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.ledger.browser_closes.fetch_add(1, Ordering::SeqCst);
        if self.script.browser_close_hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

struct FakePage {
    script: Script,
    ledger: Arc<Ledger>,
    crashed: Arc<AtomicBool>,
}

impl FakePage {
    fn check_alive(&self) -> Result<(), BrowserError> {
        if self.crashed.load(Ordering::SeqCst) {
            Err(BrowserError::Disconnected("Target closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), BrowserError> {
        self.check_alive()?;
        *self.ledger.viewport.lock().unwrap() = Some(viewport);
        Ok(())
    }

    async fn set_content(&self, html: &str) -> Result<(), BrowserError> {
        self.check_alive()?;
        if let Some(delay) = self.script.load_delay {
            tokio::time::sleep(delay).await;
        }
        *self.ledger.loaded_html.lock().unwrap() = Some(html.to_string());
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.check_alive()?;
        if script.contains("readyState") {
            if self.script.crash_after_load {
                self.crashed.store(true, Ordering::SeqCst);
            }
            Ok(json!(true))
        } else if script.contains("document.fonts") {
            Ok(json!(self.script.fonts_api))
        } else if script.contains("scrollHeight") {
            let h = self.script.content_height_px;
            Ok(json!({
                "bodyScrollHeight": h - 12.0,
                "rootScrollHeight": h,
                "bodyOffsetHeight": h - 20.0,
            }))
        } else {
            Err(BrowserError::Protocol(format!("unexpected script: {script}")))
        }
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError> {
        self.check_alive()?;
        if let Some(delay) = self.script.export_delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.export_fails {
            return Err(BrowserError::Protocol("Printing failed".to_string()));
        }
        self.ledger.printed.lock().unwrap().push(options.clone());
        Ok(FAKE_PDF.to_vec())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.ledger.page_closes.fetch_add(1, Ordering::SeqCst);
        if self.script.page_close_hangs {
            std::future::pending::<()>().await;
        }
        self.check_alive()
    }
}
