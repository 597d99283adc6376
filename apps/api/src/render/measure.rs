//! Content measurement, in two sequential waits: fonts settle, then height is read.
//!
//! Fonts must settle first: a late font swap changes line heights after first
//! paint, and a height read before that under-sizes the page.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::render::error::BrowserError;
use crate::render::session::PageHandle;

const FONT_READY_SCRIPT: &str = r#"(async () => {
    if (document.fonts && document.fonts.ready) {
        await document.fonts.ready;
        return true;
    }
    return false;
})()"#;

// Reading offsetHeight first flushes any pending reflow.
const CONTENT_HEIGHT_SCRIPT: &str = r#"(() => {
    const body = document.body;
    const root = document.documentElement;
    void body.offsetHeight;
    return {
        bodyScrollHeight: body.scrollHeight,
        rootScrollHeight: root.scrollHeight,
        bodyOffsetHeight: body.offsetHeight,
    };
})()"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontReadiness {
    /// The page exposed a font-loading signal and it resolved.
    Signalled,
    /// No signal available; waited the fallback delay instead.
    Unsupported,
}

#[derive(Debug, Clone, Copy)]
pub struct FontTimings {
    pub settle: Duration,
    pub fallback: Duration,
}

/// Raw height readings. Each property under-reports for some layouts
/// (floats, collapsed margins), so the largest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightProbe {
    pub body_scroll_height: f64,
    pub root_scroll_height: f64,
    pub body_offset_height: f64,
}

impl HeightProbe {
    pub fn content_height_px(&self) -> f64 {
        [
            self.body_scroll_height,
            self.root_scroll_height,
            self.body_offset_height,
        ]
        .into_iter()
        .filter(|h| h.is_finite())
        .fold(0.0, f64::max)
    }
}

pub async fn wait_for_fonts(
    page: &dyn PageHandle,
    timings: FontTimings,
) -> Result<FontReadiness, BrowserError> {
    let signalled = page
        .evaluate(FONT_READY_SCRIPT)
        .await?
        .as_bool()
        .unwrap_or(false);

    let (readiness, delay) = if signalled {
        (FontReadiness::Signalled, timings.settle)
    } else {
        (FontReadiness::Unsupported, timings.fallback)
    };
    tokio::time::sleep(delay).await;
    debug!(?readiness, delay_ms = delay.as_millis() as u64, "Fonts settled");
    Ok(readiness)
}

pub async fn measure_content_height(page: &dyn PageHandle) -> Result<HeightProbe, BrowserError> {
    let value = page.evaluate(CONTENT_HEIGHT_SCRIPT).await?;
    serde_json::from_value(value)
        .map_err(|e| BrowserError::Protocol(format!("unexpected height reading: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::session::{BrowserHandle, BrowserLauncher, LaunchOptions, Viewport};
    use crate::render::testing::{FakeLauncher, Script};

    async fn fake_page(script: Script) -> Box<dyn crate::render::session::PageHandle> {
        let launcher = FakeLauncher::new(script);
        let options = LaunchOptions {
            launch_timeout: Duration::from_secs(30),
            page_timeout: Duration::from_secs(30),
            network_idle: Duration::from_millis(500),
            viewport: Viewport::letter(),
        };
        let mut browser: Box<dyn BrowserHandle> = launcher.launch(&options).await.unwrap();
        browser.new_page().await.unwrap()
    }

    #[test]
    fn test_max_of_three_readings_wins() {
        let probe = HeightProbe {
            body_scroll_height: 1200.0,
            root_scroll_height: 1180.0,
            body_offset_height: 1250.0,
        };
        assert_eq!(probe.content_height_px(), 1250.0);
    }

    #[test]
    fn test_non_finite_readings_are_ignored() {
        let probe = HeightProbe {
            body_scroll_height: f64::NAN,
            root_scroll_height: 900.0,
            body_offset_height: f64::INFINITY,
        };
        assert_eq!(probe.content_height_px(), 900.0);
    }

    #[test]
    fn test_probe_deserializes_from_page_json() {
        let probe: HeightProbe = serde_json::from_value(serde_json::json!({
            "bodyScrollHeight": 10,
            "rootScrollHeight": 20.5,
            "bodyOffsetHeight": 5
        }))
        .unwrap();
        assert_eq!(probe.content_height_px(), 20.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_after_font_signal() {
        let page = fake_page(Script::default()).await;
        let timings = FontTimings {
            settle: Duration::from_millis(500),
            fallback: Duration::from_secs(2),
        };
        let started = tokio::time::Instant::now();
        let readiness = wait_for_fonts(page.as_ref(), timings).await.unwrap();
        assert_eq!(readiness, FontReadiness::Signalled);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(500) && waited < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_delay_without_font_signal() {
        let page = fake_page(Script {
            fonts_api: false,
            ..Script::default()
        })
        .await;
        let timings = FontTimings {
            settle: Duration::from_millis(500),
            fallback: Duration::from_secs(2),
        };
        let started = tokio::time::Instant::now();
        let readiness = wait_for_fonts(page.as_ref(), timings).await.unwrap();
        assert_eq!(readiness, FontReadiness::Unsupported);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_measurement_reads_largest_property() {
        let page = fake_page(Script {
            content_height_px: 1500.0,
            ..Script::default()
        })
        .await;
        let probe = measure_content_height(page.as_ref()).await.unwrap();
        assert_eq!(probe.content_height_px(), 1500.0);
        assert!(probe.body_scroll_height < 1500.0);
    }
}
