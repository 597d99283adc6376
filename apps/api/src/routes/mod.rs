pub mod health;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::render::handlers;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // PDF export, one endpoint per document family
        .route("/api/v1/resumes/pdf", post(handlers::handle_resume_pdf))
        .route(
            "/api/v1/cover-letters/pdf",
            post(handlers::handle_cover_letter_pdf),
        )
        .fallback(not_found)
        .with_state(state)
}
