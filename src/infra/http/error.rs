use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::application::articles::ArticleError;
use crate::application::error::ErrorReport;
use crate::application::images::ImageError;
use crate::application::validation::FieldErrors;

/// HTTP-edge error with a structured JSON body.
///
/// Upstream and internal failures render a generic message only; the detail
/// travels in the [`ErrorReport`] extension for the logging middleware.
#[derive(Debug)]
pub enum ApiError {
    Validation(FieldErrors),
    PayloadTooLarge {
        size_bytes: usize,
        limit_bytes: usize,
    },
    NotFound(&'static str),
    BadRequest {
        public: &'static str,
        detail: String,
    },
    Upstream {
        public: &'static str,
        detail: String,
    },
    Internal(String),
}

impl From<ArticleError> for ApiError {
    fn from(err: ArticleError) -> Self {
        match err {
            ArticleError::NotFound => Self::NotFound("Article not found"),
            ArticleError::Validation(errors) => Self::Validation(errors),
            ArticleError::Optimizer(detail) => Self::Upstream {
                public: "Image upload failed",
                detail,
            },
            ArticleError::Repo(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Validation(errors) => Self::Validation(errors),
            ImageError::NotFound => Self::NotFound("Image not found"),
            ImageError::Storage(err) => Self::Upstream {
                public: "Image upload failed",
                detail: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("response serialization failed: {err}"))
    }
}

fn megabytes(bytes: usize) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, detail) = match self {
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "success": false, "errors": errors }),
                "validation failed".to_string(),
            ),
            Self::PayloadTooLarge {
                size_bytes,
                limit_bytes,
            } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({
                    "success": false,
                    "message": "Request Entity Too Large",
                    "error": format!(
                        "The file exceeds the allowed limit of {:.0} MB",
                        megabytes(limit_bytes)
                    ),
                    "file_size": format!("{:.2} MB", megabytes(size_bytes)),
                    "max_size": format!("{:.0} MB", megabytes(limit_bytes)),
                }),
                format!("upload of {size_bytes} bytes exceeds limit of {limit_bytes} bytes"),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({ "error": message }),
                message.to_string(),
            ),
            Self::BadRequest { public, detail } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": public }),
                detail,
            ),
            Self::Upstream { public, detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "message": public }),
                detail,
            ),
            Self::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "message": "Internal server error" }),
                detail,
            ),
        };

        let mut response = (status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", status, detail).attach(&mut response);
        response
    }
}
