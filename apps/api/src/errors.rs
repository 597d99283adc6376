use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::render::RenderError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Render failures were already logged with full detail by the pipeline.
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Render(e) => (e.status_code(), e.category().code(), e.public_message()),
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::error::RenderStage;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_timeout_body_shape() {
        let (status, body) = body_of(RenderError::Timeout(RenderStage::Export).into()).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "TIMEOUT");
        assert!(body["error"]["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_unknown_body_hides_detail() {
        let err = RenderError::Unknown {
            stage: RenderStage::Export,
            message: "panicked at src/lib.rs:42".to_string(),
        };
        let (status, body) = body_of(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Failed to generate PDF.");
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let (status, body) = body_of(AppError::NotFound("No route for /x".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
