//! The single render pipeline shared by every document family.
//!
//! validate → launch → open page → load → settle fonts → measure → export,
//! with browser teardown awaited on every path once a browser was launched.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::render::assemble::{assemble_document, AssembledDocument, RenderRequest};
use crate::render::error::{ErrorCategory, RenderError, RenderStage};
use crate::render::export::{export_pdf, PdfOutput};
use crate::render::fonts::DocumentFamily;
use crate::render::geometry::PageGeometry;
use crate::render::measure::{measure_content_height, wait_for_fonts, FontTimings};
use crate::render::session::{bounded, BrowserLauncher, BrowserSession, LaunchOptions, Viewport};

// ────────────────────────────────────────────────────────────────────────────
// Timings
// ────────────────────────────────────────────────────────────────────────────

/// Per-stage bounds and fixed delays. Each is independently configurable.
#[derive(Debug, Clone)]
pub struct RenderTimings {
    pub launch_timeout: Duration,
    /// Navigation, content load and export.
    pub page_timeout: Duration,
    /// Font-ready signal plus the settle/fallback delay.
    pub font_ready_timeout: Duration,
    pub measure_timeout: Duration,
    pub font_settle: Duration,
    pub font_fallback: Duration,
    pub network_idle: Duration,
}

impl Default for RenderTimings {
    fn default() -> Self {
        Self {
            launch_timeout: Duration::from_secs(30),
            page_timeout: Duration::from_secs(30),
            font_ready_timeout: Duration::from_secs(30),
            measure_timeout: Duration::from_secs(30),
            font_settle: Duration::from_millis(500),
            font_fallback: Duration::from_secs(2),
            network_idle: Duration::from_millis(500),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request state machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ErrorCategory),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Start,
    Validating,
    Launching,
    PageOpen,
    ContentLoaded,
    FontsSettled,
    Measured,
    Exported,
    Closed(Outcome),
}

impl RenderState {
    fn rank(self) -> u8 {
        match self {
            RenderState::Start => 0,
            RenderState::Validating => 1,
            RenderState::Launching => 2,
            RenderState::PageOpen => 3,
            RenderState::ContentLoaded => 4,
            RenderState::FontsSettled => 5,
            RenderState::Measured => 6,
            RenderState::Exported => 7,
            RenderState::Closed(_) => 8,
        }
    }

    /// Forward-only. `Closed(Success)` is reachable only from `Exported`,
    /// `Closed(Failure)` from any non-terminal state.
    pub fn can_advance_to(self, next: RenderState) -> bool {
        match (self, next) {
            (RenderState::Closed(_), _) => false,
            (RenderState::Exported, RenderState::Closed(Outcome::Success)) => true,
            (_, RenderState::Closed(Outcome::Success)) => false,
            (_, RenderState::Closed(Outcome::Failure(_))) => true,
            (current, next) => next.rank() == current.rank() + 1,
        }
    }
}

/// Tracks one request through [`RenderState`], refusing illegal moves.
#[derive(Debug)]
pub struct RenderProgress {
    state: RenderState,
}

impl Default for RenderProgress {
    fn default() -> Self {
        Self {
            state: RenderState::Start,
        }
    }
}

impl RenderProgress {
    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn advance(&mut self, next: RenderState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(from = ?self.state, to = ?next, "Ignoring illegal render state transition");
            return false;
        }
        debug!(from = ?self.state, to = ?next, "Render state");
        self.state = next;
        true
    }

    fn fail(&mut self, err: &RenderError) {
        self.advance(RenderState::Closed(Outcome::Failure(err.category())));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub struct RenderPipeline {
    launcher: Arc<dyn BrowserLauncher>,
    timings: RenderTimings,
    /// Caps simultaneous browser processes held by this service.
    permits: Semaphore,
}

impl RenderPipeline {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        timings: RenderTimings,
        max_concurrent_renders: usize,
    ) -> Self {
        Self {
            launcher,
            timings,
            permits: Semaphore::new(max_concurrent_renders.max(1)),
        }
    }

    /// Renders `request` to a single-page PDF sized to its content.
    pub async fn render(
        &self,
        family: &DocumentFamily,
        request: RenderRequest,
    ) -> Result<PdfOutput, RenderError> {
        let span = info_span!(
            "render",
            render_id = %Uuid::new_v4(),
            kind = %family.kind(),
            template = %request.template_id,
        );
        let mut progress = RenderProgress::default();
        let result = self
            .render_tracked(family, &request, &mut progress)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match &result {
            Ok(output) => {
                progress.advance(RenderState::Closed(Outcome::Success));
                info!(
                    bytes = output.len(),
                    height_in = output.geometry().height_inches,
                    extended = output.geometry().is_extended(),
                    state = ?progress.state(),
                    "PDF rendered"
                );
            }
            Err(err) => {
                progress.fail(err);
                error!(
                    category = err.category().code(),
                    error = %err,
                    state = ?progress.state(),
                    "PDF render failed"
                );
            }
        }
        result
    }

    async fn render_tracked(
        &self,
        family: &DocumentFamily,
        request: &RenderRequest,
        progress: &mut RenderProgress,
    ) -> Result<PdfOutput, RenderError> {
        progress.advance(RenderState::Validating);
        let document = assemble_document(request, family.fonts())?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| RenderError::Unknown {
                stage: RenderStage::Launch,
                message: e.to_string(),
            })?;

        progress.advance(RenderState::Launching);
        let mut session = BrowserSession::launch(self.launcher.as_ref(), self.launch_options()).await?;

        let trailing_buffer_in = family.trailing_buffer_in(&request.template_id);
        let outcome = self
            .drive(&mut session, &document, trailing_buffer_in, progress)
            .await;
        // awaited on every path; Drop covers only cancellation
        let teardown = session.close().await;
        if !(teardown.page_closed && teardown.browser_closed) {
            warn!(
                page_closed = teardown.page_closed,
                browser_closed = teardown.browser_closed,
                "Browser teardown incomplete"
            );
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut BrowserSession,
        document: &AssembledDocument,
        trailing_buffer_in: f64,
        progress: &mut RenderProgress,
    ) -> Result<PdfOutput, RenderError> {
        session.open_page().await?;
        progress.advance(RenderState::PageOpen);

        session.load(document).await?;
        progress.advance(RenderState::ContentLoaded);

        let page = session.page(RenderStage::SettleFonts)?;
        let font_timings = FontTimings {
            settle: self.timings.font_settle,
            fallback: self.timings.font_fallback,
        };
        bounded(
            RenderStage::SettleFonts,
            self.timings.font_ready_timeout,
            wait_for_fonts(page, font_timings),
        )
        .await?;
        progress.advance(RenderState::FontsSettled);

        let probe = bounded(
            RenderStage::Measure,
            self.timings.measure_timeout,
            measure_content_height(page),
        )
        .await?;
        let content_height_px = probe.content_height_px();
        let geometry = PageGeometry::from_content_height(content_height_px, trailing_buffer_in);
        info!(
            content_height_px,
            width_in = geometry.width_inches,
            height_in = geometry.height_inches,
            "Content measured"
        );
        progress.advance(RenderState::Measured);

        let output = bounded(
            RenderStage::Export,
            session.page_timeout(),
            export_pdf(page, geometry),
        )
        .await?;
        progress.advance(RenderState::Exported);
        Ok(output)
    }

    fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            launch_timeout: self.timings.launch_timeout,
            page_timeout: self.timings.page_timeout,
            network_idle: self.timings.network_idle,
            viewport: Viewport::letter(),
        }
    }
}
