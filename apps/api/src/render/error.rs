//! Error taxonomy for the PDF rendering pipeline.
//!
//! Every failure, whichever stage raised it, is folded into one of five
//! categories. The category decides the HTTP status and the public message;
//! the underlying detail only ever reaches the log.

use axum::http::StatusCode;
use thiserror::Error;

/// The pipeline operation that was in progress when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Launch,
    OpenPage,
    LoadContent,
    SettleFonts,
    Measure,
    Export,
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RenderStage::Launch => "browser launch",
            RenderStage::OpenPage => "page setup",
            RenderStage::LoadContent => "content load",
            RenderStage::SettleFonts => "font settling",
            RenderStage::Measure => "content measurement",
            RenderStage::Export => "PDF export",
        };
        f.write_str(label)
    }
}

/// Stable, caller-visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidInput,
    BrowserConnectionLost,
    Timeout,
    ContentLoadTimeout,
    Unknown,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "INVALID_INPUT",
            ErrorCategory::BrowserConnectionLost => "BROWSER_CONNECTION_LOST",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::ContentLoadTimeout => "CONTENT_LOAD_TIMEOUT",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCategory::Timeout | ErrorCategory::ContentLoadTimeout => {
                StatusCode::REQUEST_TIMEOUT
            }
            ErrorCategory::BrowserConnectionLost | ErrorCategory::Unknown => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Low-level failure reported by a browser backend.
///
/// Backends only say *how* an operation failed; [`RenderError::from_browser`]
/// decides what that means for the request given the stage it happened in.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser disconnected: {0}")]
    Disconnected(String),

    #[error("browser operation timed out: {0}")]
    TimedOut(String),

    #[error("{0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Browser connection lost during {stage}: {message}")]
    BrowserConnectionLost { stage: RenderStage, message: String },

    #[error("{0} timed out")]
    Timeout(RenderStage),

    #[error("content load timed out")]
    ContentLoadTimeout,

    #[error("Render failed during {stage}: {message}")]
    Unknown { stage: RenderStage, message: String },
}

/// Substrings that CDP and Chrome use when the target or the whole process went away.
const DISCONNECT_MARKERS: &[&str] = &[
    "target closed",
    "session closed",
    "browser closed",
    "connection closed",
    "crashed",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out"];

impl RenderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RenderError::InvalidInput(_) => ErrorCategory::InvalidInput,
            RenderError::BrowserConnectionLost { .. } => ErrorCategory::BrowserConnectionLost,
            RenderError::Timeout(_) => ErrorCategory::Timeout,
            RenderError::ContentLoadTimeout => ErrorCategory::ContentLoadTimeout,
            RenderError::Unknown { .. } => ErrorCategory::Unknown,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.category().status_code()
    }

    /// Message safe to return to the caller. Never includes backend detail.
    pub fn public_message(&self) -> String {
        match self {
            RenderError::InvalidInput(msg) => msg.clone(),
            RenderError::BrowserConnectionLost { .. } => {
                "The PDF renderer lost its browser connection. Please try again.".to_string()
            }
            RenderError::Timeout(stage) => {
                format!("PDF generation timed out during {stage}. Please try again.")
            }
            RenderError::ContentLoadTimeout => {
                "Document content took too long to load. Check external resources and try again."
                    .to_string()
            }
            RenderError::Unknown { .. } => "Failed to generate PDF.".to_string(),
        }
    }

    /// A bounded wait for `stage` elapsed.
    pub fn timed_out(stage: RenderStage) -> Self {
        match stage {
            RenderStage::LoadContent => RenderError::ContentLoadTimeout,
            other => RenderError::Timeout(other),
        }
    }

    pub fn from_browser(stage: RenderStage, err: BrowserError) -> Self {
        match err {
            BrowserError::Disconnected(message) => {
                RenderError::BrowserConnectionLost { stage, message }
            }
            BrowserError::TimedOut(_) => RenderError::timed_out(stage),
            BrowserError::Protocol(message) => classify_message(stage, message),
        }
    }
}

/// Falls back to inspecting the backend message when the failure carries no
/// structured kind. Unrecognised messages are `Unknown`.
pub fn classify_message(stage: RenderStage, message: String) -> RenderError {
    let lowered = message.to_ascii_lowercase();
    if DISCONNECT_MARKERS.iter().any(|m| lowered.contains(m)) {
        RenderError::BrowserConnectionLost { stage, message }
    } else if TIMEOUT_MARKERS.iter().any(|m| lowered.contains(m)) {
        RenderError::timed_out(stage)
    } else {
        RenderError::Unknown { stage, message }
    }
}
