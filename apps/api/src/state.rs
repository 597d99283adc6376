use std::sync::Arc;

use crate::render::{DocumentFamily, RenderPipeline};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RenderPipeline>,
    /// Font registry and trailing buffers for resume templates.
    pub resumes: Arc<DocumentFamily>,
    pub cover_letters: Arc<DocumentFamily>,
}
