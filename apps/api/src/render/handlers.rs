//! Axum route handlers for PDF export.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::render::assemble::RenderRequest;
use crate::render::error::RenderError;
use crate::render::export::PdfOutput;
use crate::render::fonts::{DocumentFamily, DocumentKind};
use crate::state::AppState;

const PAGE_HEIGHT_HEADER: HeaderName = HeaderName::from_static("x-page-height-inches");

/// Body accepted by both export endpoints. `html` stays loosely typed so a
/// missing or non-string fragment is reported as invalid input rather than
/// as a JSON extraction failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPdfRequest {
    #[serde(default)]
    pub html: Option<Value>,
    #[serde(default)]
    pub template_id: Option<String>,
}

impl TryFrom<RenderPdfRequest> for RenderRequest {
    type Error = RenderError;

    fn try_from(body: RenderPdfRequest) -> Result<Self, Self::Error> {
        let html_fragment = match body.html {
            None | Some(Value::Null) => None,
            Some(Value::String(html)) => Some(html),
            Some(_) => {
                return Err(RenderError::InvalidInput(
                    "HTML content must be a string".to_string(),
                ))
            }
        };
        Ok(RenderRequest {
            html_fragment,
            template_id: body.template_id.unwrap_or_default(),
        })
    }
}

/// POST /api/v1/resumes/pdf
pub async fn handle_resume_pdf(
    State(state): State<AppState>,
    body: Result<Json<RenderPdfRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    render_pdf(&state, &state.resumes, body).await
}

/// POST /api/v1/cover-letters/pdf
pub async fn handle_cover_letter_pdf(
    State(state): State<AppState>,
    body: Result<Json<RenderPdfRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    render_pdf(&state, &state.cover_letters, body).await
}

async fn render_pdf(
    state: &AppState,
    family: &DocumentFamily,
    body: Result<Json<RenderPdfRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body.map_err(|rejection| {
        RenderError::InvalidInput(format!("Malformed request body: {}", rejection.body_text()))
    })?;
    let request = RenderRequest::try_from(body)?;
    let template_id = request.template_id.clone();

    let output = state.pipeline.render(family, request).await?;
    Ok(pdf_response(family.kind(), &template_id, output))
}

fn pdf_response(kind: DocumentKind, template_id: &str, output: PdfOutput) -> Response {
    let disposition = format!(
        "inline; filename=\"{}-{}.pdf\"",
        kind.slug(),
        filename_safe(template_id)
    );
    let height = format!("{:.4}", output.geometry().height_inches);
    let length = output.len().to_string();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_LENGTH, length),
            (header::CONTENT_DISPOSITION, disposition),
            (PAGE_HEIGHT_HEADER, height),
        ],
        Body::from(output.into_bytes()),
    )
        .into_response()
}

fn filename_safe(template_id: &str) -> String {
    let cleaned: String = template_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
